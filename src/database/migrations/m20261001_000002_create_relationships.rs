use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// (table, left column, left target, right column, right target)
const EDGE_TABLES: [(&str, &str, &str, &str, &str); 9] = [
    ("individual_events", "individual_id", "individuals", "event_id", "events"),
    ("family_events", "family_id", "families", "event_id", "events"),
    ("child_in_family", "child_id", "individuals", "family_id", "families"),
    ("media_individuals", "media_id", "media", "individual_id", "individuals"),
    ("media_events", "media_id", "media", "event_id", "events"),
    ("individual_sources", "individual_id", "individuals", "source_id", "sources"),
    ("family_sources", "family_id", "families", "source_id", "sources"),
    ("individual_notes", "individual_id", "individuals", "note_id", "notes"),
    ("family_notes", "family_id", "families", "note_id", "notes"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table, left, left_target, right, right_target) in EDGE_TABLES {
            manager
                .create_table(
                    Table::create()
                        .table(Alias::new(table))
                        .if_not_exists()
                        .col(ColumnDef::new(Alias::new(left)).integer().not_null())
                        .col(ColumnDef::new(Alias::new(right)).integer().not_null())
                        .primary_key(
                            Index::create()
                                .col(Alias::new(left))
                                .col(Alias::new(right)),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name(format!("fk_{}_{}", table, left))
                                .from(Alias::new(table), Alias::new(left))
                                .to(Alias::new(left_target), Alias::new("id"))
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name(format!("fk_{}_{}", table, right))
                                .from(Alias::new(table), Alias::new(right))
                                .to(Alias::new(right_target), Alias::new("id"))
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Reverse lookups (e.g. all individuals of an event)
            manager
                .create_index(
                    Index::create()
                        .name(format!("idx_{}_{}", table, right))
                        .table(Alias::new(table))
                        .col(Alias::new(right))
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table, ..) in EDGE_TABLES.iter().rev() {
            manager
                .drop_table(Table::drop().table(Alias::new(*table)).to_owned())
                .await?;
        }
        Ok(())
    }
}
