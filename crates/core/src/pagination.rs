use chaingate_error::{ChainGateError, ErrorCode, ErrorContext, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationInfo {
    pub previous_page: u64,
    pub current_page: u64,
    pub next_page: u64,
    pub total_pages: u64,
}

/// Number of pages needed for `total_rows`; never less than one.
pub fn total_pages(rows_per_page: u64, total_rows: u64) -> u64 {
    if rows_per_page == 0 {
        return 1;
    }
    total_rows.div_ceil(rows_per_page).max(1)
}

/// Compute page navigation for `current_page`.
///
/// The result always satisfies
/// `1 <= previous_page <= current_page <= next_page <= total_pages`.
/// Inputs that cannot satisfy it (page 0, zero rows per page, a page past the
/// end) are rejected rather than clamped.
pub fn compute_pagination(
    current_page: u64,
    rows_per_page: u64,
    total_rows: u64,
) -> Result<PaginationInfo> {
    let info = PaginationInfo {
        previous_page: if current_page <= 1 {
            current_page
        } else {
            current_page - 1
        },
        current_page,
        next_page: if current_page.saturating_mul(rows_per_page) >= total_rows {
            current_page
        } else {
            current_page + 1
        },
        total_pages: total_pages(rows_per_page, total_rows),
    };

    let valid = rows_per_page > 0
        && 1 <= info.previous_page
        && info.previous_page <= info.current_page
        && info.current_page <= info.next_page
        && info.next_page <= info.total_pages;

    if !valid {
        return Err(ChainGateError::new(
            ErrorCode::InternalServerError,
            format!(
                "Invalid pagination: page {} of {} rows at {} per page",
                current_page, total_rows, rows_per_page
            ),
        )
        .with_context(ErrorContext::Pagination {
            current_page,
            rows_per_page,
            total_rows,
        }));
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn page(previous: u64, current: u64, next: u64, total: u64) -> PaginationInfo {
        PaginationInfo {
            previous_page: previous,
            current_page: current,
            next_page: next,
            total_pages: total,
        }
    }

    #[test]
    fn test_empty_result_has_one_page() {
        assert_eq!(compute_pagination(1, 10, 0).unwrap(), page(1, 1, 1, 1));
    }

    #[test]
    fn test_middle_page() {
        assert_eq!(compute_pagination(2, 10, 25).unwrap(), page(1, 2, 3, 3));
    }

    #[test]
    fn test_last_page_does_not_advance() {
        assert_eq!(compute_pagination(3, 10, 25).unwrap(), page(2, 3, 3, 3));
    }

    #[test]
    fn test_exact_multiple() {
        assert_eq!(compute_pagination(2, 10, 20).unwrap(), page(1, 2, 2, 2));
        assert_eq!(compute_pagination(1, 10, 20).unwrap(), page(1, 1, 2, 2));
    }

    #[test]
    fn test_violations_fail_loudly() {
        // page zero
        let err = compute_pagination(0, 10, 5).unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalServerError);
        // past the last page
        assert!(compute_pagination(5, 10, 25).is_err());
        // no rows per page
        assert!(compute_pagination(1, 0, 25).is_err());
    }

    proptest! {
        #[test]
        fn test_invariant_holds_within_range(
            rows_per_page in 1u64..1000,
            total_rows in 0u64..1_000_000,
            seed in any::<u64>(),
        ) {
            let pages = total_pages(rows_per_page, total_rows);
            let current = 1 + seed % pages;
            let info = compute_pagination(current, rows_per_page, total_rows).unwrap();
            prop_assert!(1 <= info.previous_page);
            prop_assert!(info.previous_page <= info.current_page);
            prop_assert!(info.current_page <= info.next_page);
            prop_assert!(info.next_page <= info.total_pages);
            prop_assert!(info.total_pages >= 1);
        }
    }
}
