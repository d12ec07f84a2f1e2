#![forbid(unsafe_code)]
//! Lists the MyChain tools

use colored::*;

const TOOLS: &[(&str, &str)] = &[
    ("mychain-node", "apply genesis once, then produce blocks"),
    ("mychain-genesis", "print the default genesis or check a genesis file"),
    ("mychain-query", "show params, supply, miners, blocks and users"),
];

fn main() {
    println!("{} {}", "MyChain".bright_cyan().bold(), env!("CARGO_PKG_VERSION").dimmed());
    println!();
    for (name, about) in TOOLS {
        println!("  {} {}", format!("{:<17}", name).bright_white(), about.dimmed());
    }
    println!();
    println!("{}", "Each tool accepts --help.".yellow());
}
