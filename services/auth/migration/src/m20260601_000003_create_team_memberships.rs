use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TeamMemberships::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TeamMemberships::TeamId).uuid().not_null())
                    .col(ColumnDef::new(TeamMemberships::UserId).uuid().not_null())
                    .col(ColumnDef::new(TeamMemberships::Role).string().not_null())
                    .col(
                        ColumnDef::new(TeamMemberships::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(TeamMemberships::TeamId)
                            .col(TeamMemberships::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(TeamMemberships::Table, TeamMemberships::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(TeamMemberships::Table, TeamMemberships::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(TeamMemberships::Table)
                    .col(TeamMemberships::UserId)
                    .name("idx_team_memberships_user_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TeamMemberships::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum TeamMemberships {
    Table,
    TeamId,
    UserId,
    Role,
    JoinedAt,
}

#[derive(Iden)]
enum Teams {
    Table,
    Id,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
