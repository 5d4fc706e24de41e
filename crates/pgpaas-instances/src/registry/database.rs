use std::sync::Arc;

use async_trait::async_trait;
use pgpaas_core::{ServiceError, ServiceResult};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectOptions, Database, DatabaseConnection,
    EntityTrait, ModelTrait, QueryFilter, QueryOrder, SqlErr,
};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};

use super::entity::{self, Entity as Instances};
use super::migration::Migrator;
use super::InstanceRegistry;
use crate::error::InstanceError;
use crate::types::InstanceRecord;

/// Registry persisted through sea-orm (SQLite or PostgreSQL)
pub struct DatabaseRegistry {
    db: Arc<DatabaseConnection>,
}

impl DatabaseRegistry {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Connect to `database_url` and bring the schema up to date
    pub async fn connect(database_url: &str) -> ServiceResult<Self> {
        let mut opt = ConnectOptions::new(database_url);
        if database_url.starts_with("sqlite::memory:") {
            // Every pooled connection would otherwise see its own empty database
            opt.max_connections(1).min_connections(1);
        } else {
            opt.max_connections(10).min_connections(1);
        }
        opt.sqlx_logging(false);

        let db = Database::connect(opt)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        Migrator::up(&db, None)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        info!("Instance registry ready");
        Ok(Self::new(Arc::new(db)))
    }

    async fn find(&self, id: &str) -> Result<Option<entity::Model>, InstanceError> {
        Ok(Instances::find()
            .filter(entity::Column::InstanceId.eq(id))
            .one(self.db.as_ref())
            .await?)
    }
}

#[async_trait]
impl InstanceRegistry for DatabaseRegistry {
    async fn put(&self, record: InstanceRecord) -> Result<(), InstanceError> {
        if self.find(&record.id).await?.is_some() {
            return Err(InstanceError::Conflict { id: record.id });
        }

        let model = entity::ActiveModel {
            instance_id: Set(record.id.clone()),
            name: Set(record.name),
            db_name: Set(record.db_name),
            db_user: Set(record.db_user),
            status: Set(record.status.to_string()),
            created_at: Set(record.created_at),
            ..Default::default()
        };

        match model.insert(self.db.as_ref()).await {
            Ok(_) => {
                debug!("Stored instance {}", record.id);
                Ok(())
            }
            // Lost a race with a concurrent insert of the same id
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(InstanceError::Conflict { id: record.id })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<InstanceRecord>, InstanceError> {
        Ok(self.find(id).await?.map(InstanceRecord::from))
    }

    async fn list(&self) -> Result<Vec<InstanceRecord>, InstanceError> {
        let models = Instances::find()
            .order_by_asc(entity::Column::Seq)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(InstanceRecord::from).collect())
    }

    async fn delete(&self, id: &str) -> Result<Option<InstanceRecord>, InstanceError> {
        let Some(model) = self.find(id).await? else {
            return Ok(None);
        };
        model.clone().delete(self.db.as_ref()).await?;
        debug!("Removed instance {}", id);
        Ok(Some(model.into()))
    }
}
