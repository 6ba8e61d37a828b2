//! Database inspection binary
//!
//! Prints a tournament's settlement state straight from RocksDB.

use clap::Parser;
use fairway::{
    config::StorageConfig,
    game_store,
    games::skins::{distributed_total, outstanding_pot},
    storage::RocksStorage,
};

#[derive(Parser, Debug)]
#[command(name = "inspect_db")]
#[command(about = "Dump fairway settlement records", long_about = None)]
struct Args {
    /// Tournament to inspect
    tournament_id: String,

    /// Database directory
    #[arg(long, default_value = "./DB/fairway_data")]
    db_path: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let store = RocksStorage::new_with_config(&StorageConfig {
        data_directory: args.db_path.clone(),
        clear_on_start: false,
        ..Default::default()
    })?;

    let Some(tournament) = game_store::load_tournament(&store, &args.tournament_id)? else {
        println!("❌ No tournament {} in {}", args.tournament_id, args.db_path);
        return Ok(());
    };
    println!("🏆 {} ({})", tournament.name, tournament.id);
    println!("   Holes: {}  Game: {}", tournament.rules.holes, tournament.rules.game_type);
    println!("   Entrants: {}", tournament.entrants.join(", "));

    let rounds = game_store::load_rounds(&store, &tournament.id)?;
    println!("\n📝 Rounds ({})", rounds.len());
    for round in &rounds {
        let scores = game_store::load_round_scores(&store, &round.id)?;
        let card: Vec<String> = scores
            .iter()
            .map(|s| format!("{}:{}", s.hole, s.strokes))
            .collect();
        let delegated = if round.is_delegated() { " (delegated)" } else { "" };
        println!("   {}{} [{}]", round.player_id, delegated, card.join(" "));
    }

    let skins: Vec<_> = game_store::load_skin_chain(&store, &tournament.id)?
        .into_iter()
        .map(|v| v.record)
        .collect();
    println!("\n💰 Skins");
    for skin in &skins {
        match &skin.winner_id {
            Some(winner) => println!("   Hole {:>2}: {} wins {}", skin.hole_number, winner, skin.pot_amount),
            None => println!("   Hole {:>2}: carried ({})", skin.hole_number, skin.pot_amount),
        }
    }
    println!(
        "   Distributed {}  Riding {}",
        distributed_total(&skins),
        outstanding_pot(&skins)
    );

    println!("\n🐍 Snakes");
    for snake in game_store::load_snakes(&store, &tournament.id)? {
        let s = snake.record;
        println!(
            "   {:<8} holder={} hole={} final={}",
            s.category.as_str(),
            s.current_holder_id.as_deref().unwrap_or("-"),
            s.last_hole_updated,
            s.is_final
        );
    }

    println!("\n🤝 Presses");
    for press in game_store::load_tournament_presses(&store, &tournament.id)? {
        let p = press.record;
        println!(
            "   {} {} vs {} {} from hole {} [{}] winner={}",
            p.id,
            p.initiator_id,
            p.target_id,
            p.bet_type,
            p.start_hole,
            p.status,
            p.winner_id.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
