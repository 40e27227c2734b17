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
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "PIX_HOST",
        "PIX_PORT",
        "PIX_DATABASE_URL",
        "PIX_PRODUCTION",
        "PIX_PROCESSOR_URL",
        "PIX_PROCESSOR_TIMEOUT_SECS",
        "PIX_FAKE_EMAIL_DOMAIN",
        "PIX_WEBHOOK_SIGNATURE_POLICY",
        "PIX_PRINT_WEBHOOK_URL",
        "PIX_PRINT_TIMEOUT_SECS",
        "PIX_SIMULATE_PAYMENTS",
        "PIX_ALLOW_DEV_ENDPOINTS",
        "PIX_DEV_AUTO_APPROVE_SECS",
        "PIX_SKIP_CREDENTIAL_CHECK",
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
