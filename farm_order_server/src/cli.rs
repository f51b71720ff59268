use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 16] = [
        "RUST_LOG",
        "FARM_HOST",
        "FARM_PORT",
        "FARM_DATABASE_URL",
        "FARM_PRICING_CONFIG",
        "FARM_SWEEP_INTERVAL_SECS",
        "FARM_PROVIDER_TIMEOUT_MS",
        "FARM_FULL_PAYMENT_CUTOFF_DAYS",
        "FARM_REMAINDER_DUE_DAYS",
        "FARM_REMINDER_OFFSETS",
        "FARM_LATE_ADDITION_WINDOW_DAYS",
        "FARM_LATE_ADDITION_MULTIPLIER_PCT",
        "FARM_DECREASE_POLICY_PIG_BOX",
        "FARM_DECREASE_POLICY_HATCHING_EGGS",
        "FARM_DECREASE_POLICY_LIVE_CHICKENS",
        "FARM_WEBHOOK_HMAC_CHECKS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
