use ladder_persistence_sea_orm::{
    create_db_pool,
    entity::{applied_match, player, player_stats},
};
use sea_orm::{ConnectionTrait, DatabaseBackend, Schema};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let pool = create_db_pool()
        .await
        .expect("Failed to connect to database");

    let schema = Schema::new(DatabaseBackend::MySql);
    let player_table = schema.create_table_from_entity(player::Entity);
    let player_stats_table = schema.create_table_from_entity(player_stats::Entity);
    let applied_match_table = schema.create_table_from_entity(applied_match::Entity);

    pool.execute(&player_table)
        .await
        .expect("Failed to create players table");
    pool.execute(&player_stats_table)
        .await
        .expect("Failed to create player stats table");
    pool.execute(&applied_match_table)
        .await
        .expect("Failed to create applied matches table");

    println!("Created database tables successfully");
}
