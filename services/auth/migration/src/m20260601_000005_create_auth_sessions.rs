use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthSessions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuthSessions::UserId).uuid().not_null())
                    .col(ColumnDef::new(AuthSessions::DeviceIdHash).binary().not_null())
                    .col(ColumnDef::new(AuthSessions::AccessTokenHash).binary().not_null())
                    .col(
                        ColumnDef::new(AuthSessions::AccessExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuthSessions::RefreshTokenHash).binary().not_null())
                    .col(
                        ColumnDef::new(AuthSessions::RefreshExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuthSessions::RotatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(AuthSessions::RevokedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(AuthSessions::LastUsedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(AuthSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(AuthSessions::Table, AuthSessions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(AuthSessions::Table)
                    .col(AuthSessions::RefreshTokenHash)
                    .name("idx_auth_sessions_refresh_token_hash")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuthSessions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AuthSessions {
    Table,
    Id,
    UserId,
    DeviceIdHash,
    AccessTokenHash,
    AccessExpiresAt,
    RefreshTokenHash,
    RefreshExpiresAt,
    RotatedAt,
    RevokedAt,
    LastUsedAt,
    CreatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
