// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use yatube::auth::is_safe_redirect;
use yatube::forms::valid_username;
use yatube::pagination::Paginator;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    count: u16,
    per_page: u8,
    page: Option<&'a str>,
    text: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let paginator = Paginator::new(input.count as usize, input.per_page as usize);
    let request = paginator.get_page(input.page);
    assert!(request.number >= 1 && request.number <= paginator.num_pages());
    assert!(request.offset() <= input.count as usize);

    if valid_username(input.text) {
        assert!(!input.text.is_empty());
    }
    if is_safe_redirect(input.text) {
        assert!(input.text.starts_with('/'));
    }
});
