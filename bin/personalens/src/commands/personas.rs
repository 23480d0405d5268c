use personalens_core::persona::{builtin_objectives, builtin_personas};

pub async fn run() -> anyhow::Result<()> {
    println!("Personas:");
    for persona in builtin_personas() {
        println!(
            "  {} {:<10} {}: {}",
            persona.icon, persona.id, persona.name, persona.short_description
        );
    }

    println!();
    println!("Objectives (for autonomous sessions):");
    for objective in builtin_objectives() {
        println!("  {:<20} {}", objective.id, objective.label);
    }

    Ok(())
}
