use chrono::{NaiveDate, NaiveDateTime};
use retail_insights::library::{
    Availability, BookId, Catalogue, LibraryError, LogAction, MemberId, catalogue::Borrower,
};

fn at(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(10, minute, 0))
        .expect("valid timestamp")
}

fn issued_iff_held(catalogue: &Catalogue) -> bool {
    let held = catalogue
        .members_with_loans()
        .iter()
        .flat_map(|Borrower { member, .. }| {
            catalogue
                .borrowed_by(member.id)
                .expect("member exists")
                .into_iter()
                .map(|book| book.id)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    catalogue
        .books()
        .all(|book| (book.availability == Availability::Issued) == held.contains(&book.id))
}

#[test]
fn lending_keeps_status_and_loans_in_step() {
    let mut catalogue = Catalogue::default();
    let books = ["Dune", "Emma", "Ulysses"]
        .iter()
        .map(|title| catalogue.add_book(title, "Author", "Novel").expect("book"))
        .collect::<Vec<_>>();
    let ann = catalogue.add_member("Ann", 30, "ann@example.com").expect("member");
    let ben = catalogue.add_member("Ben", 52, "ben@example.com").expect("member");

    let mut log_sizes = vec![catalogue.log().len()];
    let steps: Vec<(bool, MemberId, BookId)> = vec![
        (true, ann, books[0]),
        (true, ben, books[0]),
        (true, ben, books[1]),
        (false, ann, books[1]),
        (false, ann, books[0]),
        (true, ben, books[0]),
        (false, ben, books[2]),
    ];
    for (minute, (borrow, member, book)) in steps.into_iter().enumerate() {
        let when = at(minute as u32);
        let _ = if borrow {
            catalogue.borrow(member, book, when)
        } else {
            catalogue.return_book(member, book, when)
        };
        assert!(issued_iff_held(&catalogue));
        let size = catalogue.log().len();
        assert!(size >= *log_sizes.last().expect("previous size"));
        log_sizes.push(size);
    }

    let actions = catalogue
        .log()
        .entries()
        .iter()
        .map(|entry| entry.action)
        .collect::<Vec<_>>();
    assert_eq!(
        actions,
        vec![
            LogAction::Borrowed,
            LogAction::Borrowed,
            LogAction::Returned,
            LogAction::Borrowed,
        ]
    );
    let ben_holds = catalogue
        .borrowed_by(ben)
        .expect("ben exists")
        .iter()
        .map(|book| book.title.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ben_holds, vec!["Emma", "Dune"]);
}

#[test]
fn unknown_member_history_is_an_error() {
    let catalogue = Catalogue::default();
    assert_eq!(
        catalogue.borrowed_by(MemberId(99)).unwrap_err(),
        LibraryError::MemberNotFound(MemberId(99))
    );
}

#[test]
fn availability_override_keeps_issued_iff_held() {
    let mut catalogue = Catalogue::new(1, 1);
    let atlas = catalogue.add_book("Atlas", "Cartographer", "Reference").expect("book");
    let ann = catalogue.add_member("Ann", 30, "ann@example.com").expect("member");
    let ben = catalogue.add_member("Ben", 41, "ben@example.com").expect("member");
    catalogue.borrow(ann, atlas, at(0)).expect("first loan");

    assert!(matches!(
        catalogue.set_availability(atlas, Availability::Available),
        Err(LibraryError::InvalidInput { field: "availability", .. })
    ));
    assert!(issued_iff_held(&catalogue));
    assert!(catalogue.borrow(ben, atlas, at(1)).is_err());

    catalogue.return_book(ann, atlas, at(2)).expect("return");
    assert!(catalogue.set_availability(atlas, Availability::Issued).is_err());
    assert!(issued_iff_held(&catalogue));
    assert_eq!(catalogue.available_books_by_genre("reference").len(), 1);
    assert_eq!(
        catalogue.set_availability(BookId(42), Availability::Available),
        Err(LibraryError::BookNotFound(BookId(42)))
    );
}
