use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250101_000001_create_instances::Migration)]
    }
}

mod m20250101_000001_create_instances {
    use sea_orm_migration::prelude::*;

    #[derive(DeriveMigrationName)]
    pub struct Migration;

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Instances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Instances::Seq)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Instances::InstanceId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Instances::Name).string().not_null())
                        .col(ColumnDef::new(Instances::DbName).string().not_null())
                        .col(ColumnDef::new(Instances::DbUser).string().not_null())
                        .col(ColumnDef::new(Instances::Status).string().not_null())
                        .col(
                            ColumnDef::new(Instances::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Instances::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Instances {
        Table,
        Seq,
        InstanceId,
        Name,
        DbName,
        DbUser,
        Status,
        CreatedAt,
    }
}
