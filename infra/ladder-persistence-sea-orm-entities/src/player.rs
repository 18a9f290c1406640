use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "players")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub username: Option<String>,
    /// Lowercased username, null for anonymous players.
    #[sea_orm(unique)]
    pub username_normalized: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[sea_orm(unique)]
    pub email_normalized: Option<String>,
    pub password_hash: Option<String>,
    pub is_anonymous: bool,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub last_login: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::player_stats::Entity")]
    Stats,
}

impl Related<super::player_stats::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stats.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
