//! Request types and their handlers.

use std::sync::Arc;

use courier::prelude::*;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

// ============================================================================
// Accounts
// ============================================================================

/// In-memory account store.
#[derive(Debug, Default)]
pub struct AccountRepository {
    usernames: Mutex<Vec<String>>,
}

impl AccountRepository {
    pub fn save(&self, username: &str) {
        self.usernames.lock().push(username.to_string());
        info!(username, "Account saved");
    }

    pub fn count(&self) -> usize {
        self.usernames.lock().len()
    }
}

/// Creates an account; answers with a confirmation message.
#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub username: String,
    pub password: String,
}

impl Request for CreateAccount {
    type Response = String;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::new("username must not be empty"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::new("password must not be empty"));
        }
        Ok(())
    }
}

pub struct CreateAccountHandler {
    repository: Arc<AccountRepository>,
}

impl CreateAccountHandler {
    pub fn new(repository: Arc<AccountRepository>) -> Self {
        Self { repository }
    }
}

#[register_handler]
#[async_trait]
impl RequestHandler<CreateAccount> for CreateAccountHandler {
    async fn handle(
        &self,
        request: CreateAccount,
        _cancel: CancellationToken,
    ) -> Result<String, BoxError> {
        self.repository.save(&request.username);
        Ok(format!("Account {} created", request.username))
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: u32,
    pub title: String,
}

/// Lists the catalog.
#[derive(Debug, Clone, Copy)]
pub struct ListItems;

impl Request for ListItems {
    type Response = Vec<Item>;
}

#[derive(Default)]
pub struct ListItemsHandler;

#[register_handler(scope = shared)]
#[async_trait]
impl RequestHandler<ListItems> for ListItemsHandler {
    async fn handle(&self, _: ListItems, _: CancellationToken) -> Result<Vec<Item>, BoxError> {
        Ok(vec![
            Item {
                id: 1,
                title: "Book 1".into(),
            },
            Item {
                id: 2,
                title: "Book 2".into(),
            },
        ])
    }
}

/// Wires the handlers' dependencies.
pub fn container(repository: Arc<AccountRepository>) -> Container {
    let mut container = Container::new();
    container
        .provide_arc(repository)
        .register(|c| Ok(CreateAccountHandler::new(c.get()?)))
        .register_default::<ListItemsHandler>();
    container
}
