//! In-memory lending catalogue.
//!
//! A [`Catalogue`] owns every book, member, open loan and log entry, along
//! with the identifier sequences. Borrowing and returning keep a book
//! `Issued` exactly while one member's loan list holds it.

use std::{collections::BTreeMap, fmt};

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_BOOK_SEED: u32 = 1001;
pub const DEFAULT_MEMBER_SEED: u32 = 20013;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BookId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MemberId(pub u32);

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LibraryError {
    #[error("Book ID {0} not found")]
    BookNotFound(BookId),
    #[error("Member ID {0} not found")]
    MemberNotFound(MemberId),
    #[error("Book '{title}' ({id}) is not available (already issued)")]
    BookUnavailable { id: BookId, title: String },
    #[error("{member} did not borrow '{title}'")]
    NotBorrowed { member: String, title: String },
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Availability {
    #[default]
    Available,
    Issued,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "Available",
            Availability::Issued => "Issued",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub availability: Availability,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub age: u32,
    pub contact: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogAction {
    Borrowed,
    Returned,
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogAction::Borrowed => "Borrowed",
            LogAction::Returned => "Returned",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub at: NaiveDateTime,
    pub member: MemberId,
    pub book: BookId,
    pub action: LogAction,
}

/// Append-only record of lending activity.
#[derive(Debug, Clone, Default)]
pub struct TransactionLog {
    entries: Vec<LogEntry>,
}

impl TransactionLog {
    fn append(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Sequence(u32);

impl Sequence {
    fn next(&mut self) -> u32 {
        let value = self.0;
        self.0 += 1;
        value
    }
}

/// A member together with how many books they currently hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Borrower<'a> {
    pub member: &'a Member,
    pub loans: usize,
}

#[derive(Debug, Clone)]
pub struct Catalogue {
    books: BTreeMap<BookId, Book>,
    members: BTreeMap<MemberId, Member>,
    loans: BTreeMap<MemberId, Vec<BookId>>,
    log: TransactionLog,
    book_ids: Sequence,
    member_ids: Sequence,
}

impl Default for Catalogue {
    fn default() -> Self {
        Catalogue::new(DEFAULT_BOOK_SEED, DEFAULT_MEMBER_SEED)
    }
}

fn required(field: &'static str, value: &str) -> Result<String, LibraryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::InvalidInput {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl Catalogue {
    pub fn new(book_seed: u32, member_seed: u32) -> Self {
        Catalogue {
            books: BTreeMap::new(),
            members: BTreeMap::new(),
            loans: BTreeMap::new(),
            log: TransactionLog::default(),
            book_ids: Sequence(book_seed),
            member_ids: Sequence(member_seed),
        }
    }

    pub fn add_book(&mut self, title: &str, author: &str, genre: &str) -> Result<BookId, LibraryError> {
        let title = required("title", title)?;
        let author = required("author", author)?;
        let genre = required("genre", genre)?;
        let id = BookId(self.book_ids.next());
        self.books.insert(
            id,
            Book {
                id,
                title,
                author,
                genre,
                availability: Availability::Available,
            },
        );
        Ok(id)
    }

    pub fn add_member(&mut self, name: &str, age: u32, contact: &str) -> Result<MemberId, LibraryError> {
        let name = required("name", name)?;
        let contact = required("contact", contact)?;
        if age == 0 {
            return Err(LibraryError::InvalidInput {
                field: "age",
                reason: "must be a positive number".to_string(),
            });
        }
        let id = MemberId(self.member_ids.next());
        self.members.insert(
            id,
            Member {
                id,
                name,
                age,
                contact,
            },
        );
        self.loans.insert(id, Vec::new());
        Ok(id)
    }

    pub fn book(&self, id: BookId) -> Result<&Book, LibraryError> {
        self.books.get(&id).ok_or(LibraryError::BookNotFound(id))
    }

    pub fn member(&self, id: MemberId) -> Result<&Member, LibraryError> {
        self.members.get(&id).ok_or(LibraryError::MemberNotFound(id))
    }

    pub fn books(&self) -> impl Iterator<Item = &Book> {
        self.books.values()
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    pub fn search_books_by_title(&self, query: &str) -> Vec<&Book> {
        self.books
            .values()
            .filter(|book| contains_ignore_case(&book.title, query))
            .collect()
    }

    pub fn search_books_by_author(&self, query: &str) -> Vec<&Book> {
        self.books
            .values()
            .filter(|book| contains_ignore_case(&book.author, query))
            .collect()
    }

    /// Books whose title or author contains `query`, ordered by id.
    pub fn search_books(&self, query: &str) -> Vec<&Book> {
        self.books
            .values()
            .filter(|book| {
                contains_ignore_case(&book.title, query) || contains_ignore_case(&book.author, query)
            })
            .collect()
    }

    pub fn search_members_by_name(&self, query: &str) -> Vec<&Member> {
        self.members
            .values()
            .filter(|member| contains_ignore_case(&member.name, query))
            .collect()
    }

    /// Sets a book's status. A status that disagrees with the open loans is
    /// refused: a held book stays `Issued` and an unheld one stays `Available`.
    pub fn set_availability(&mut self, id: BookId, status: Availability) -> Result<(), LibraryError> {
        let held = self.is_held(id);
        let book = self.books.get_mut(&id).ok_or(LibraryError::BookNotFound(id))?;
        let expected = if held {
            Availability::Issued
        } else {
            Availability::Available
        };
        if status != expected {
            let reason = if held {
                format!("'{}' is on loan, return it first", book.title)
            } else {
                format!("'{}' is not on loan, borrow it instead", book.title)
            };
            return Err(LibraryError::InvalidInput {
                field: "availability",
                reason,
            });
        }
        book.availability = status;
        Ok(())
    }

    fn is_held(&self, id: BookId) -> bool {
        self.loans.values().any(|held| held.contains(&id))
    }

    pub fn borrow(&mut self, member: MemberId, book: BookId, at: NaiveDateTime) -> Result<(), LibraryError> {
        self.member(member)?;
        let entry = self.books.get_mut(&book).ok_or(LibraryError::BookNotFound(book))?;
        if entry.availability != Availability::Available {
            return Err(LibraryError::BookUnavailable {
                id: book,
                title: entry.title.clone(),
            });
        }
        entry.availability = Availability::Issued;
        self.loans.entry(member).or_default().push(book);
        self.log.append(LogEntry {
            at,
            member,
            book,
            action: LogAction::Borrowed,
        });
        Ok(())
    }

    pub fn return_book(&mut self, member: MemberId, book: BookId, at: NaiveDateTime) -> Result<(), LibraryError> {
        let holder = self.member(member)?.name.clone();
        let title = self.book(book)?.title.clone();
        let held = self.loans.entry(member).or_default();
        let Some(position) = held.iter().position(|id| *id == book) else {
            return Err(LibraryError::NotBorrowed {
                member: holder,
                title,
            });
        };
        held.remove(position);
        if let Some(entry) = self.books.get_mut(&book) {
            entry.availability = Availability::Available;
        }
        self.log.append(LogEntry {
            at,
            member,
            book,
            action: LogAction::Returned,
        });
        Ok(())
    }

    /// Available books whose genre equals `genre`, ignoring case.
    pub fn available_books_by_genre(&self, genre: &str) -> Vec<&Book> {
        let genre = genre.trim().to_lowercase();
        self.books
            .values()
            .filter(|book| {
                book.availability == Availability::Available && book.genre.to_lowercase() == genre
            })
            .collect()
    }

    /// Members holding at least one book, ordered by id.
    pub fn members_with_loans(&self) -> Vec<Borrower<'_>> {
        self.loans
            .iter()
            .filter(|(_, held)| !held.is_empty())
            .filter_map(|(id, held)| {
                self.members.get(id).map(|member| Borrower {
                    member,
                    loans: held.len(),
                })
            })
            .collect()
    }

    /// Books `member` currently holds, in borrow order.
    pub fn borrowed_by(&self, member: MemberId) -> Result<Vec<&Book>, LibraryError> {
        self.member(member)?;
        Ok(self
            .loans
            .get(&member)
            .map(|held| held.iter().filter_map(|id| self.books.get(id)).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid timestamp")
    }

    fn stocked() -> (Catalogue, BookId, BookId, MemberId, MemberId) {
        let mut catalogue = Catalogue::default();
        let dune = catalogue.add_book("Dune", "Frank Herbert", "Sci-Fi").unwrap();
        let emma = catalogue.add_book("Emma", "Jane Austen", "Classic").unwrap();
        let asha = catalogue.add_member("Asha", 31, "asha@example.com").unwrap();
        let ravi = catalogue.add_member("Ravi", 45, "555-0101").unwrap();
        (catalogue, dune, emma, asha, ravi)
    }

    #[test]
    fn identifiers_follow_the_seeds() {
        let (_, dune, emma, asha, ravi) = stocked();
        assert_eq!((dune, emma), (BookId(1001), BookId(1002)));
        assert_eq!((asha, ravi), (MemberId(20013), MemberId(20014)));

        let mut custom = Catalogue::new(1, 500);
        assert_eq!(custom.add_book("A", "B", "C").unwrap(), BookId(1));
        assert_eq!(custom.add_member("D", 9, "x").unwrap(), MemberId(500));
    }

    #[test]
    fn borrowing_issues_the_book_and_logs_it() {
        let (mut catalogue, dune, _, asha, ravi) = stocked();
        catalogue.borrow(asha, dune, at(9)).unwrap();
        assert_eq!(catalogue.book(dune).unwrap().availability, Availability::Issued);

        let err = catalogue.borrow(ravi, dune, at(10)).unwrap_err();
        assert!(matches!(err, LibraryError::BookUnavailable { .. }));
        assert_eq!(catalogue.log().len(), 1);
        assert_eq!(catalogue.log().entries()[0].action, LogAction::Borrowed);
    }

    #[test]
    fn only_the_holder_can_return() {
        let (mut catalogue, dune, _, asha, ravi) = stocked();
        catalogue.borrow(asha, dune, at(9)).unwrap();
        let err = catalogue.return_book(ravi, dune, at(10)).unwrap_err();
        assert_eq!(
            err,
            LibraryError::NotBorrowed {
                member: "Ravi".to_string(),
                title: "Dune".to_string()
            }
        );
        catalogue.return_book(asha, dune, at(11)).unwrap();
        assert_eq!(catalogue.book(dune).unwrap().availability, Availability::Available);
        assert!(catalogue.borrowed_by(asha).unwrap().is_empty());
        assert_eq!(catalogue.log().len(), 2);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let (mut catalogue, dune, _, asha, _) = stocked();
        assert_eq!(
            catalogue.borrow(MemberId(1), dune, at(9)),
            Err(LibraryError::MemberNotFound(MemberId(1)))
        );
        assert_eq!(
            catalogue.borrow(asha, BookId(7), at(9)),
            Err(LibraryError::BookNotFound(BookId(7)))
        );
        assert!(catalogue.log().is_empty());
    }

    #[test]
    fn search_is_case_insensitive_and_ordered() {
        let (mut catalogue, dune, emma, _, _) = stocked();
        let austen = catalogue.add_book("Austen Letters", "Various", "Letters").unwrap();
        let ids = catalogue
            .search_books("AUSTEN")
            .iter()
            .map(|book| book.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![emma, austen]);
        assert_eq!(catalogue.search_books_by_title("un")[0].id, dune);
        assert_eq!(catalogue.search_books_by_author("herbert")[0].id, dune);
        assert!(catalogue.search_books_by_author("austen letters").is_empty());
        assert_eq!(catalogue.search_members_by_name("rav").len(), 1);
    }

    #[test]
    fn genre_report_skips_issued_books() {
        let (mut catalogue, dune, _, asha, _) = stocked();
        assert_eq!(catalogue.available_books_by_genre("sci-fi").len(), 1);
        catalogue.borrow(asha, dune, at(9)).unwrap();
        assert!(catalogue.available_books_by_genre("Sci-Fi").is_empty());
        let borrowers = catalogue.members_with_loans();
        assert_eq!(borrowers.len(), 1);
        assert_eq!(borrowers[0].member.id, asha);
        assert_eq!(borrowers[0].loans, 1);
    }

    #[test]
    fn status_override_cannot_contradict_loans() {
        let (mut catalogue, dune, emma, asha, ravi) = stocked();
        catalogue.borrow(asha, dune, at(9)).unwrap();

        let err = catalogue
            .set_availability(dune, Availability::Available)
            .unwrap_err();
        assert!(matches!(err, LibraryError::InvalidInput { field: "availability", .. }));
        assert_eq!(catalogue.book(dune).unwrap().availability, Availability::Issued);
        assert!(matches!(
            catalogue.borrow(ravi, dune, at(10)),
            Err(LibraryError::BookUnavailable { .. })
        ));

        assert!(catalogue.set_availability(emma, Availability::Issued).is_err());
        catalogue.set_availability(dune, Availability::Issued).unwrap();
        catalogue.set_availability(emma, Availability::Available).unwrap();
        assert_eq!(catalogue.log().len(), 1);
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut catalogue = Catalogue::default();
        assert!(matches!(
            catalogue.add_book(" ", "x", "y"),
            Err(LibraryError::InvalidInput { field: "title", .. })
        ));
        assert!(matches!(
            catalogue.add_member("Zoe", 0, "z"),
            Err(LibraryError::InvalidInput { field: "age", .. })
        ));
        assert_eq!(catalogue.add_book("A", "B", "C").unwrap(), BookId(DEFAULT_BOOK_SEED));
    }
}
