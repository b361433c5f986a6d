use std::cell::RefCell;
use std::collections::VecDeque;

use crate::client::QueryClient;
use crate::error::{Error, Result};
use crate::query::Query;
use crate::table::Table;

/// Hands out queued responses in order and remembers every query it was given. Once the queue
/// is drained it answers with an empty table.
#[derive(Default)]
pub struct RecordingClient {
    responses: RefCell<VecDeque<Result<Table>>>,
    issued: RefCell<Vec<Query>>,
}

impl RecordingClient {
    pub fn returning(table: Table) -> Self {
        let client = Self::default();
        client.responses.borrow_mut().push_back(Ok(table));
        client
    }

    pub fn failing(err: Error) -> Self {
        let client = Self::default();
        client.responses.borrow_mut().push_back(Err(err));
        client
    }

    pub fn issued(&self) -> Vec<Query> {
        self.issued.borrow().clone()
    }
}

impl QueryClient for RecordingClient {
    fn query(&self, query: &Query) -> Result<Table> {
        self.issued.borrow_mut().push(query.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(Table::default()))
    }
}
