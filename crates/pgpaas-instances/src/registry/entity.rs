//! `instances` table
//!
//! `seq` is a surrogate key that gives listing a stable insertion order;
//! the public identifier is `instance_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::{InstanceRecord, InstanceStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "instances")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub seq: i32,
    #[sea_orm(unique)]
    pub instance_id: String,
    pub name: String,
    pub db_name: String,
    pub db_user: String,
    /// creating, ready, deleting, failed
    pub status: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for InstanceRecord {
    fn from(model: Model) -> Self {
        InstanceRecord {
            id: model.instance_id,
            name: model.name,
            db_name: model.db_name,
            db_user: model.db_user,
            // Rows are only written by this crate; an unreadable status is treated as failed
            status: InstanceStatus::from_str(&model.status).unwrap_or(InstanceStatus::Failed),
            created_at: model.created_at,
        }
    }
}
