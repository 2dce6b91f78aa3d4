use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::{Deserialize, Serialize};

/// Pagination parameters, extracted from `page_num`/`page_size` query values.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    page_num: usize,
    page_size: usize,
}

impl Pagination {
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn skip(&self) -> u64 {
        ((self.page_num - 1) * self.page_size) as u64
    }

    /// Wrap a page of items together with the total count.
    pub fn paginate<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            page_num: self.page_num,
            page_size: self.page_size,
            total,
            items,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let page_num = match req.query_value::<usize>("page_num").unwrap_or(Ok(1)) {
            Ok(page_num) if page_num > 0 => page_num,
            _ => return request::Outcome::Failure((Status::BadRequest, ())),
        };
        let page_size = match req.query_value::<usize>("page_size").unwrap_or(Ok(50)) {
            Ok(page_size) if page_size > 0 => page_size,
            _ => return request::Outcome::Failure((Status::BadRequest, ())),
        };
        request::Outcome::Success(Self {
            page_num,
            page_size,
        })
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub page_num: usize,
    pub page_size: usize,
    pub total: u64,
    pub items: Vec<T>,
}
