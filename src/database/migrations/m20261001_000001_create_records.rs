use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Individuals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Individuals::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Individuals::GedcomId)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Individuals::FirstName).string().null())
                    .col(ColumnDef::new(Individuals::LastName).string().null())
                    .col(ColumnDef::new(Individuals::Sex).string().null())
                    .col(ColumnDef::new(Individuals::ProfileImageId).integer().null())
                    .col(
                        ColumnDef::new(Individuals::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Individuals::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_individuals_last_name")
                    .table(Individuals::Table)
                    .col(Individuals::LastName)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Families::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Families::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Families::GedcomId)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Families::Spouse1Id).integer().null())
                    .col(ColumnDef::new(Families::Spouse2Id).integer().null())
                    .col(ColumnDef::new(Families::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Families::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_families_spouse1")
                            .from(Families::Table, Families::Spouse1Id)
                            .to(Individuals::Table, Individuals::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_families_spouse2")
                            .from(Families::Table, Families::Spouse2Id)
                            .to(Individuals::Table, Individuals::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Events::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Events::EventType).string().not_null())
                    .col(ColumnDef::new(Events::EventDate).date().null())
                    .col(ColumnDef::new(Events::Place).string().null())
                    .col(ColumnDef::new(Events::Description).text().null())
                    .col(ColumnDef::new(Events::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Events::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_events_type")
                    .table(Events::Table)
                    .col(Events::EventType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Media::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Media::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Media::Filename).string().not_null())
                    .col(ColumnDef::new(Media::FilePath).string().not_null())
                    .col(ColumnDef::new(Media::ThumbnailPath).string().null())
                    .col(ColumnDef::new(Media::MediaType).string().null())
                    .col(ColumnDef::new(Media::FileSize).big_integer().null())
                    .col(ColumnDef::new(Media::MediaDate).date().null())
                    .col(ColumnDef::new(Media::Description).text().null())
                    .col(ColumnDef::new(Media::ExtractedText).text().null())
                    .col(ColumnDef::new(Media::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Media::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Places::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Places::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Places::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Places::Latitude).double().null())
                    .col(ColumnDef::new(Places::Longitude).double().null())
                    .col(
                        ColumnDef::new(Places::GeocodeStatus)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Places::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Places::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Sources::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sources::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Sources::GedcomId)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Sources::Title).text().null())
                    .col(ColumnDef::new(Sources::Author).string().null())
                    .col(ColumnDef::new(Sources::PublicationInfo).text().null())
                    .col(ColumnDef::new(Sources::Repository).text().null())
                    .col(ColumnDef::new(Sources::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Sources::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Notes::GedcomId)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Notes::Text).text().null())
                    .col(ColumnDef::new(Notes::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Notes::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sources::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Places::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Media::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Families::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Individuals::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Individuals {
    Table,
    Id,
    GedcomId,
    FirstName,
    LastName,
    Sex,
    ProfileImageId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Families {
    Table,
    Id,
    GedcomId,
    #[iden = "spouse1_id"]
    Spouse1Id,
    #[iden = "spouse2_id"]
    Spouse2Id,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Events {
    Table,
    Id,
    EventType,
    EventDate,
    Place,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Media {
    Table,
    Id,
    Filename,
    FilePath,
    ThumbnailPath,
    MediaType,
    FileSize,
    MediaDate,
    Description,
    ExtractedText,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Places {
    Table,
    Id,
    Name,
    Latitude,
    Longitude,
    GeocodeStatus,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Sources {
    Table,
    Id,
    GedcomId,
    Title,
    Author,
    PublicationInfo,
    Repository,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Notes {
    Table,
    Id,
    GedcomId,
    Text,
    CreatedAt,
    UpdatedAt,
}
