pub mod catalogue;

use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::info;

use crate::{
    cli::{LibraryArgs, LibraryCommands},
    table,
};

pub use catalogue::{
    Availability, Book, BookId, Catalogue, LibraryError, LogAction, LogEntry, Member, MemberId,
};

const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn execute(args: &LibraryArgs) -> Result<()> {
    match &args.command {
        LibraryCommands::Demo(demo) => {
            let mut catalogue = Catalogue::new(demo.book_seed, demo.member_seed);
            let outcomes = run_demo(&mut catalogue)?;
            print!("{}", render_demo(&catalogue, &outcomes)?);
            info!(
                "Demo finished with {} book(s), {} member(s) and {} log entr(ies)",
                catalogue.books().count(),
                catalogue.members().count(),
                catalogue.log().len()
            );
            Ok(())
        }
    }
}

/// Fixed clock for the scripted session, one minute per step.
struct DemoClock {
    now: NaiveDateTime,
}

impl DemoClock {
    fn start() -> Result<Self> {
        let now = NaiveDate::from_ymd_opt(2024, 1, 15)
            .and_then(|date| date.and_hms_opt(9, 0, 0))
            .context("Building demo start time")?;
        Ok(DemoClock { now })
    }

    fn tick(&mut self) -> NaiveDateTime {
        self.now += Duration::minutes(1);
        self.now
    }
}

/// Result of one scripted lending step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub description: String,
    pub refusal: Option<LibraryError>,
}

/// Seeds `catalogue` with sample books and members, then plays a fixed
/// sequence of borrows and returns. Refused steps are recorded, not raised.
pub fn run_demo(catalogue: &mut Catalogue) -> Result<Vec<StepOutcome>> {
    let mockingbird = catalogue.add_book("To Kill a Mockingbird", "Harper Lee", "Fiction")?;
    let orwell = catalogue.add_book("1984", "George Orwell", "Dystopian")?;
    let pride = catalogue.add_book("Pride and Prejudice", "Jane Austen", "Romance")?;
    let gatsby = catalogue.add_book("The Great Gatsby", "F. Scott Fitzgerald", "Fiction")?;
    catalogue.add_book("Sapiens", "Yuval Noah Harari", "History")?;
    let alice = catalogue.add_member("Alice Johnson", 28, "alice@email.com")?;
    let bob = catalogue.add_member("Bob Smith", 35, "bob@email.com")?;
    let carol = catalogue.add_member("Carol White", 42, "555-0199")?;

    enum Step {
        Borrow(MemberId, BookId),
        Return(MemberId, BookId),
    }
    let script = [
        Step::Borrow(alice, mockingbird),
        Step::Borrow(bob, orwell),
        Step::Borrow(carol, mockingbird),
        Step::Return(alice, mockingbird),
        Step::Borrow(carol, mockingbird),
        Step::Return(bob, pride),
        Step::Borrow(alice, gatsby),
    ];

    let mut clock = DemoClock::start()?;
    let mut outcomes = Vec::with_capacity(script.len());
    for step in script {
        let at = clock.tick();
        let (verb, member, book, result) = match step {
            Step::Borrow(member, book) => ("borrows", member, book, catalogue.borrow(member, book, at)),
            Step::Return(member, book) => {
                ("returns", member, book, catalogue.return_book(member, book, at))
            }
        };
        let description = format!(
            "{} {verb} '{}'",
            catalogue.member(member)?.name,
            catalogue.book(book)?.title
        );
        outcomes.push(StepOutcome {
            description,
            refusal: result.err(),
        });
    }
    Ok(outcomes)
}

fn book_rows<'a>(books: impl IntoIterator<Item = &'a Book>) -> Vec<Vec<String>> {
    books
        .into_iter()
        .map(|book| {
            vec![
                book.id.to_string(),
                book.title.clone(),
                book.author.clone(),
                book.genre.clone(),
                book.availability.to_string(),
            ]
        })
        .collect()
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|h| h.to_string()).collect()
}

fn book_headers() -> Vec<String> {
    headers(&["Book ID", "Title", "Author", "Genre", "Status"])
}

pub fn render_demo(catalogue: &Catalogue, outcomes: &[StepOutcome]) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(out, "Lending session");
    for outcome in outcomes {
        match &outcome.refusal {
            None => {
                let _ = writeln!(out, "  ok       {}", outcome.description);
            }
            Some(err) => {
                let _ = writeln!(out, "  refused  {} ({err})", outcome.description);
            }
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "All books");
    out.push_str(&table::render_table(&book_headers(), &book_rows(catalogue.books())));

    let _ = writeln!(out);
    let _ = writeln!(out, "All members");
    let rows = catalogue
        .members()
        .map(|m| vec![m.id.to_string(), m.name.clone(), m.age.to_string(), m.contact.clone()])
        .collect::<Vec<_>>();
    out.push_str(&table::render_table(
        &headers(&["Member ID", "Name", "Age", "Contact"]),
        &rows,
    ));

    let query = "austen";
    let _ = writeln!(out);
    let _ = writeln!(out, "Search results for '{query}'");
    out.push_str(&table::render_table(
        &book_headers(),
        &book_rows(catalogue.search_books(query)),
    ));

    let genre = "Fiction";
    let _ = writeln!(out);
    let _ = writeln!(out, "Available books in genre: {genre}");
    out.push_str(&table::render_table(
        &book_headers(),
        &book_rows(catalogue.available_books_by_genre(genre)),
    ));

    let _ = writeln!(out);
    let _ = writeln!(out, "Members with borrowed books");
    let borrowers = catalogue.members_with_loans();
    let rows = borrowers
        .iter()
        .map(|b| vec![b.member.id.to_string(), b.member.name.clone(), b.loans.to_string()])
        .collect::<Vec<_>>();
    out.push_str(&table::render_table(
        &headers(&["Member ID", "Name", "Books Borrowed"]),
        &rows,
    ));

    for borrower in &borrowers {
        let _ = writeln!(out);
        let _ = writeln!(out, "Borrowed by {}", borrower.member.name);
        out.push_str(&table::render_table(
            &book_headers(),
            &book_rows(catalogue.borrowed_by(borrower.member.id)?),
        ));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Transaction log");
    let mut rows = Vec::with_capacity(catalogue.log().len());
    for entry in catalogue.log().entries() {
        rows.push(vec![
            entry.at.format(LOG_TIME_FORMAT).to_string(),
            entry.member.to_string(),
            entry.book.to_string(),
            entry.action.to_string(),
            catalogue.member(entry.member)?.name.clone(),
            catalogue.book(entry.book)?.title.clone(),
        ]);
    }
    out.push_str(&table::render_table(
        &headers(&["Date", "Member ID", "Book ID", "Action", "Member", "Book"]),
        &rows,
    ));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_script_leaves_expected_loans() {
        let mut catalogue = Catalogue::default();
        let outcomes = run_demo(&mut catalogue).expect("demo runs");
        let refused = outcomes.iter().filter(|o| o.refusal.is_some()).count();
        assert_eq!(outcomes.len(), 7);
        assert_eq!(refused, 2);
        assert!(matches!(
            outcomes[2].refusal,
            Some(LibraryError::BookUnavailable { .. })
        ));
        assert!(matches!(
            outcomes[5].refusal,
            Some(LibraryError::NotBorrowed { .. })
        ));
        assert_eq!(catalogue.log().len(), 5);
        assert_eq!(catalogue.members_with_loans().len(), 3);
    }

    #[test]
    fn refused_steps_can_be_kept_after_the_catalogue_moves_on() {
        let mut catalogue = Catalogue::default();
        let outcomes = run_demo(&mut catalogue).expect("demo runs");
        let refusals = outcomes
            .iter()
            .filter(|outcome| outcome.refusal.is_some())
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(refusals.len(), 2);
        assert_eq!(refusals[0], outcomes[2]);
        assert_eq!(refusals[1].refusal, outcomes[5].refusal.clone());
    }
}
