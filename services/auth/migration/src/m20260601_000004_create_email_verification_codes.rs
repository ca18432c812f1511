use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailVerificationCodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailVerificationCodes::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmailVerificationCodes::Email).string().not_null())
                    .col(ColumnDef::new(EmailVerificationCodes::Code).string().not_null())
                    .col(
                        ColumnDef::new(EmailVerificationCodes::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailVerificationCodes::UsedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(EmailVerificationCodes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(EmailVerificationCodes::Table)
                    .col(EmailVerificationCodes::Email)
                    .col(EmailVerificationCodes::Code)
                    .name("idx_email_verification_codes_email_code")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailVerificationCodes::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum EmailVerificationCodes {
    Table,
    Id,
    Email,
    Code,
    ExpiresAt,
    UsedAt,
    CreatedAt,
}
