#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

pub const HEADER: &str = "Transaction_ID,Date,Customer_Name,Product,Total_Items,Total_Cost,Payment_Method,City,Store_Type,Discount_Applied,Customer_Category,Season,Promotion";

/// Seven rows: one whole-row repeat of the first and one row with missing
/// items, cost and category.
pub const SAMPLE_ROWS: &[&str] = &[
    "1,2023-01-02 10:00:00,Alice,\"Milk, Bread\",3,20.00,Cash,Pune,Pharmacy,False,Student,Winter,None",
    "2,2023-01-03 11:00:00,Bob,Milk,1,18.00,Card,Delhi,Supermarket,True,Student,Winter,BOGO (Buy One Get One)",
    "3,2023-04-05 12:00:00,Carol,\"Eggs, Milk\",4,40.00,Cash,Pune,Supermarket,False,Retiree,Spring,None",
    "4,2023-04-06 09:30:00,Dan,Bread,2,10.00,Mobile Payment,Mumbai,Pharmacy,True,Retiree,Spring,Discount on Selected Items",
    "5,2023-07-07 18:00:00,Alice,Soap,5,50.00,Cash,Pune,Convenience Store,False,Student,Summer,None",
    "1,2023-01-02 10:00:00,Alice,\"Milk, Bread\",3,20.00,Cash,Pune,Pharmacy,False,Student,Winter,None",
    "7,2023-10-09 08:00:00,Erin,\"Milk, Eggs\",NA,,Card,Delhi,Pharmacy,Yes,,Fall,BOGO (Buy One Get One)",
];

pub fn sample_csv() -> String {
    csv_text(HEADER, SAMPLE_ROWS)
}

pub fn csv_text(header: &str, rows: &[&str]) -> String {
    let mut text = String::from(header);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn write_sample(&self) -> PathBuf {
        self.write("transactions.csv", &sample_csv())
    }
}
