use crate::server::{Result, ServerError};
use axum::extract::{FromRequestParts, Query as AxumQuery};
use postboard_common::query::{Listing, OrderField, Pagination, SortOrder};
use serde::Serialize;
use std::num::NonZeroU32;
use tracing::debug;

#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(AxumQuery), rejection(ServerError))]
pub struct Query<T>(pub T);

/// One page of a list response.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<NonZeroU32>,
    pub previous: Option<NonZeroU32>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new<U>(
        listing: Listing<U>,
        pagination: Pagination,
        view: impl FnMut(U) -> T,
    ) -> Result<Self> {
        if !pagination.exists_for(listing.count) {
            return Err(ServerError::InvalidPage(pagination.page));
        }

        let next = pagination
            .has_next(listing.count)
            .then(|| pagination.page.checked_add(1))
            .flatten();
        let previous = NonZeroU32::new(pagination.page.get() - 1);

        Ok(Self {
            count: listing.count,
            next,
            previous,
            results: listing.items.into_iter().map(view).collect(),
        })
    }
}

#[must_use]
pub fn pagination(page: Option<NonZeroU32>, page_size: NonZeroU32) -> Pagination {
    match page {
        Some(page) => Pagination { page, page_size },
        None => Pagination::first(page_size),
    }
}

/// Unknown orderings fall back to the default one.
#[must_use]
pub fn sort_order<F: OrderField>(ordering: Option<&str>) -> SortOrder<F> {
    let Some(ordering) = ordering else {
        return SortOrder::default();
    };

    SortOrder::parse(ordering).unwrap_or_else(|| {
        debug!(ordering, "Ignoring unknown ordering");
        SortOrder::default()
    })
}
