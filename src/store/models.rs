use crate::schema::stores;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq, Serialize)]
#[diesel(table_name = stores)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Store {
    pub id: i32,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = stores)]
pub struct NewStoreRow {
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct NewStore {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1))]
    pub description: String,
    pub image: Option<String>,
}

#[derive(Deserialize, Validate, AsChangeset)]
#[diesel(table_name = stores)]
pub struct UpdateStore {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    pub image: Option<String>,
}

/// Store plus its average review rating, computed at read time.
#[derive(Serialize)]
pub struct StoreWithRating {
    #[serde(flatten)]
    pub store: Store,
    pub rating: Option<f64>,
}
