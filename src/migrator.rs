use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_catalog_tables::Migration),
            Box::new(m20240101_000003_create_lending_tables::Migration),
            Box::new(m20240101_000004_create_damage_reports_table::Migration),
            Box::new(m20240101_000005_create_warranties_table::Migration),
            Box::new(m20240101_000006_create_audit_logs_table::Migration),
        ]
    }
}

mod m20240101_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Users::Username)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Users::Role)
                                .string_len(20)
                                .not_null()
                                .default("user"),
                        )
                        .col(ColumnDef::new(Users::ResetToken).string().null())
                        .col(
                            ColumnDef::new(Users::ResetTokenExpiresAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Username,
        PasswordHash,
        Role,
        ResetToken,
        ResetTokenExpiresAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Categories::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Categories::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Categories::Description).text().null())
                        .col(
                            ColumnDef::new(Categories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Categories::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Projects::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Projects::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Projects::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Projects::Description).text().null())
                        .col(ColumnDef::new(Projects::StartDate).date().null())
                        .col(ColumnDef::new(Projects::EndDate).date().null())
                        .col(
                            ColumnDef::new(Projects::DroneCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Projects::Location).string().null())
                        .col(
                            ColumnDef::new(Projects::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Projects::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Items::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Items::Name).string().not_null())
                        .col(ColumnDef::new(Items::Description).text().null())
                        .col(
                            ColumnDef::new(Items::Quantity)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(Items::Quantity).gte(0)),
                        )
                        .col(
                            ColumnDef::new(Items::Status)
                                .string_len(32)
                                .not_null()
                                .default("available"),
                        )
                        .col(ColumnDef::new(Items::CategoryId).uuid().not_null())
                        .col(ColumnDef::new(Items::Remark).text().null())
                        .col(
                            ColumnDef::new(Items::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Items::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_items_category_id")
                                .from(Items::Table, Items::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_items_category_id")
                        .table(Items::Table)
                        .col(Items::CategoryId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Projects::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
        Name,
        Description,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Projects {
        Table,
        Id,
        Name,
        Description,
        StartDate,
        EndDate,
        DroneCount,
        Location,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Items {
        Table,
        Id,
        Name,
        Description,
        Quantity,
        Status,
        CategoryId,
        Remark,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_lending_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_lending_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BorrowRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BorrowRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BorrowRecords::UserId).uuid().not_null())
                        .col(ColumnDef::new(BorrowRecords::ItemId).uuid().not_null())
                        .col(ColumnDef::new(BorrowRecords::ProjectId).uuid().not_null())
                        .col(
                            ColumnDef::new(BorrowRecords::Quantity)
                                .integer()
                                .not_null()
                                .check(Expr::col(BorrowRecords::Quantity).gt(0)),
                        )
                        .col(
                            ColumnDef::new(BorrowRecords::RemainingQuantity)
                                .integer()
                                .not_null()
                                .check(Expr::col(BorrowRecords::RemainingQuantity).gte(0)),
                        )
                        .col(ColumnDef::new(BorrowRecords::BorrowDate).date().not_null())
                        .col(ColumnDef::new(BorrowRecords::DueDate).date().not_null())
                        .col(
                            ColumnDef::new(BorrowRecords::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_borrow_records_user_id")
                                .from(BorrowRecords::Table, BorrowRecords::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_borrow_records_item_id")
                                .from(BorrowRecords::Table, BorrowRecords::ItemId)
                                .to(Items::Table, Items::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_borrow_records_project_id")
                                .from(BorrowRecords::Table, BorrowRecords::ProjectId)
                                .to(Projects::Table, Projects::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReturnRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReturnRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnRecords::BorrowId).uuid().not_null())
                        .col(ColumnDef::new(ReturnRecords::UserId).uuid().not_null())
                        .col(ColumnDef::new(ReturnRecords::ItemId).uuid().not_null())
                        .col(ColumnDef::new(ReturnRecords::ProjectId).uuid().not_null())
                        .col(
                            ColumnDef::new(ReturnRecords::Quantity)
                                .integer()
                                .not_null()
                                .check(Expr::col(ReturnRecords::Quantity).gt(0)),
                        )
                        .col(ColumnDef::new(ReturnRecords::ReturnDate).date().not_null())
                        .col(
                            ColumnDef::new(ReturnRecords::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_return_records_borrow_id")
                                .from(ReturnRecords::Table, ReturnRecords::BorrowId)
                                .to(BorrowRecords::Table, BorrowRecords::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_return_records_user_id")
                                .from(ReturnRecords::Table, ReturnRecords::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_return_records_item_id")
                                .from(ReturnRecords::Table, ReturnRecords::ItemId)
                                .to(Items::Table, Items::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_return_records_project_id")
                                .from(ReturnRecords::Table, ReturnRecords::ProjectId)
                                .to(Projects::Table, Projects::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, table, column) in [
                (
                    "idx_borrow_records_project_id",
                    BorrowRecords::Table,
                    BorrowRecords::ProjectId,
                ),
                (
                    "idx_borrow_records_item_id",
                    BorrowRecords::Table,
                    BorrowRecords::ItemId,
                ),
                (
                    "idx_borrow_records_user_id",
                    BorrowRecords::Table,
                    BorrowRecords::UserId,
                ),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            for (name, column) in [
                ("idx_return_records_borrow_id", ReturnRecords::BorrowId),
                ("idx_return_records_project_id", ReturnRecords::ProjectId),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(ReturnRecords::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReturnRecords::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(BorrowRecords::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Items {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Projects {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum BorrowRecords {
        Table,
        Id,
        UserId,
        ItemId,
        ProjectId,
        Quantity,
        RemainingQuantity,
        BorrowDate,
        DueDate,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ReturnRecords {
        Table,
        Id,
        BorrowId,
        UserId,
        ItemId,
        ProjectId,
        Quantity,
        ReturnDate,
        CreatedAt,
    }
}

mod m20240101_000004_create_damage_reports_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_damage_reports_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DamageReports::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DamageReports::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DamageReports::ItemId).uuid().not_null())
                        .col(ColumnDef::new(DamageReports::ReporterId).uuid().not_null())
                        .col(ColumnDef::new(DamageReports::ProjectId).uuid().not_null())
                        .col(ColumnDef::new(DamageReports::Description).text().not_null())
                        .col(
                            ColumnDef::new(DamageReports::Status)
                                .string_len(20)
                                .not_null()
                                .default("Pending"),
                        )
                        .col(
                            ColumnDef::new(DamageReports::BrokenUnits)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(DamageReports::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DamageReports::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_damage_reports_item_id")
                                .from(DamageReports::Table, DamageReports::ItemId)
                                .to(Items::Table, Items::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_damage_reports_reporter_id")
                                .from(DamageReports::Table, DamageReports::ReporterId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_damage_reports_project_id")
                                .from(DamageReports::Table, DamageReports::ProjectId)
                                .to(Projects::Table, Projects::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_damage_reports_item_project")
                        .table(DamageReports::Table)
                        .col(DamageReports::ItemId)
                        .col(DamageReports::ProjectId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DamageReports::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Items {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Projects {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum DamageReports {
        Table,
        Id,
        ItemId,
        ReporterId,
        ProjectId,
        Description,
        Status,
        BrokenUnits,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000005_create_warranties_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_warranties_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Warranties::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Warranties::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Warranties::ItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(Warranties::SerialNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Warranties::PurchaseDate).date().not_null())
                        .col(
                            ColumnDef::new(Warranties::CoverageMonths)
                                .integer()
                                .not_null()
                                .default(12),
                        )
                        .col(ColumnDef::new(Warranties::Description).text().null())
                        .col(ColumnDef::new(Warranties::Lot).string().null())
                        .col(ColumnDef::new(Warranties::Remark).text().null())
                        .col(
                            ColumnDef::new(Warranties::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warranties::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_warranties_item_id")
                                .from(Warranties::Table, Warranties::ItemId)
                                .to(Items::Table, Items::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Warranties::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Items {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Warranties {
        Table,
        Id,
        ItemId,
        SerialNumber,
        PurchaseDate,
        CoverageMonths,
        Description,
        Lot,
        Remark,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000006_create_audit_logs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_audit_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // No FK on user_id: audit rows outlive deleted users.
            manager
                .create_table(
                    Table::create()
                        .table(AuditLogs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(AuditLogs::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(AuditLogs::UserId).uuid().null())
                        .col(ColumnDef::new(AuditLogs::Action).string().not_null())
                        .col(ColumnDef::new(AuditLogs::TableName).string().null())
                        .col(ColumnDef::new(AuditLogs::RecordId).uuid().null())
                        .col(ColumnDef::new(AuditLogs::OldValue).json().null())
                        .col(ColumnDef::new(AuditLogs::NewValue).json().null())
                        .col(ColumnDef::new(AuditLogs::IpAddress).string().null())
                        .col(
                            ColumnDef::new(AuditLogs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_logs_created_at")
                        .table(AuditLogs::Table)
                        .col(AuditLogs::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum AuditLogs {
        Table,
        Id,
        UserId,
        Action,
        TableName,
        RecordId,
        OldValue,
        NewValue,
        IpAddress,
        CreatedAt,
    }
}
