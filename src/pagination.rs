// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Page-number pagination for post listings
//!
//! The paginator only knows the total number of rows. It resolves the
//! requested page number into an offset/limit pair for the query, and the
//! rows that come back are wrapped into a [`Page`] for the templates.

use serde::Serialize;

/// Splits `count` items into pages of `per_page`
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: usize,
    per_page: usize,
}

/// A resolved page number, ready to be turned into a query slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub per_page: usize,
}

/// One page of results as handed to templates
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub object_list: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub has_other_pages: bool,
    pub next_page_number: Option<usize>,
    pub previous_page_number: Option<usize>,
    pub start_index: usize,
    pub end_index: usize,
}

impl Paginator {
    pub fn new(count: usize, per_page: usize) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    /// Number of pages; an empty listing still has one (empty) page
    pub fn num_pages(&self) -> usize {
        if self.count == 0 {
            1
        } else {
            self.count.div_ceil(self.per_page)
        }
    }

    /// Lenient lookup used by the listing views.
    ///
    /// Missing or non-numeric input yields the first page, numbers out of
    /// range yield the last page. An integer too wide for `i64` is still an
    /// integer, so it is out of range rather than garbage.
    pub fn get_page(&self, raw: Option<&str>) -> PageRequest {
        let last = self.num_pages();
        let number = match raw.map(str::trim) {
            None => 1,
            Some(s) => match s.parse::<i64>() {
                Ok(n) if n < 1 => last,
                Ok(n) => usize::try_from(n).map_or(last, |n| n.min(last)),
                Err(_) if is_integer(s) => last,
                Err(_) => 1,
            },
        };
        PageRequest {
            number,
            num_pages: last,
            count: self.count,
            per_page: self.per_page,
        }
    }
}

/// Optional sign followed by at least one ASCII digit
fn is_integer(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl PageRequest {
    pub fn offset(&self) -> usize {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> usize {
        self.per_page
    }

    /// Wrap the rows fetched for this page
    pub fn fill<T>(self, object_list: Vec<T>) -> Page<T> {
        let has_next = self.number < self.num_pages;
        let has_previous = self.number > 1;
        let (start_index, end_index) = if self.count == 0 {
            (0, 0)
        } else {
            (self.offset() + 1, self.offset() + object_list.len())
        };

        Page {
            object_list,
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_next,
            has_previous,
            has_other_pages: has_next || has_previous,
            next_page_number: has_next.then_some(self.number + 1),
            previous_page_number: has_previous.then(|| self.number - 1),
            start_index,
            end_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thirteen_items_split_ten_and_three() {
        let paginator = Paginator::new(13, 10);
        assert_eq!(paginator.num_pages(), 2);

        let first = paginator.get_page(None);
        assert_eq!((first.offset(), first.limit()), (0, 10));

        let second = paginator.get_page(Some("2"));
        assert_eq!(second.offset(), 10);
        let page = second.fill(vec![11, 12, 13]);
        assert_eq!(page.object_list.len(), 3);
        assert!(!page.has_next);
        assert_eq!(page.previous_page_number, Some(1));
        assert_eq!((page.start_index, page.end_index), (11, 13));
    }

    #[test]
    fn test_empty_listing_has_one_page() {
        let paginator = Paginator::new(0, 10);
        assert_eq!(paginator.num_pages(), 1);

        let page = paginator.get_page(Some("5")).fill(Vec::<i32>::new());
        assert_eq!(page.number, 1);
        assert!(!page.has_other_pages);
        assert_eq!(page.start_index, 0);
    }

    #[test]
    fn test_garbage_page_number_is_first_page() {
        let paginator = Paginator::new(35, 10);
        assert_eq!(paginator.get_page(Some("abc")).number, 1);
        assert_eq!(paginator.get_page(Some("")).number, 1);
        assert_eq!(paginator.get_page(Some("2.5")).number, 1);
    }

    #[test]
    fn test_out_of_range_page_number_is_last_page() {
        let paginator = Paginator::new(35, 10);
        assert_eq!(paginator.get_page(Some("99")).number, 4);
        assert_eq!(paginator.get_page(Some("0")).number, 4);
        assert_eq!(paginator.get_page(Some("-3")).number, 4);
        assert_eq!(paginator.get_page(Some(" 3 ")).number, 3);
    }

    #[test]
    fn test_page_number_wider_than_i64_is_last_page() {
        let paginator = Paginator::new(13, 10);
        assert_eq!(paginator.get_page(Some("99999999999999999999")).number, 2);
        assert_eq!(paginator.get_page(Some("-99999999999999999999")).number, 2);
        assert_eq!(paginator.get_page(Some("+3")).number, 2);
        assert_eq!(paginator.get_page(Some("9e99")).number, 1);
        assert_eq!(paginator.get_page(Some("-")).number, 1);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_page() {
        let paginator = Paginator::new(20, 10);
        assert_eq!(paginator.num_pages(), 2);
        let page = paginator.get_page(Some("1")).fill(vec![0; 10]);
        assert_eq!(page.next_page_number, Some(2));
    }
}
