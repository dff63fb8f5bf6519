use anyhow::Result;
use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use tracing::error;

use crate::config::Config;
use crate::crawler::Crawler;
use crate::driver::ChromeDriver;
use crate::product::ProductRecord;

const RULE_WIDTH: usize = 80;
const QUIT_WORDS: [&str; 4] = ["q", "quit", "종료", "exit"];

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    Empty,
    Search(String),
}

pub fn parse_command(line: &str) -> Command {
    let keyword = line.trim();
    if keyword.is_empty() {
        Command::Empty
    } else if QUIT_WORDS.contains(&keyword.to_lowercase().as_str()) {
        Command::Quit
    } else {
        Command::Search(keyword.to_string())
    }
}

/// Blank or unparseable input keeps the default; zero is bumped to one.
pub fn parse_limit(line: &str, default: usize) -> usize {
    line.trim().parse::<usize>().map(|n| n.max(1)).unwrap_or(default)
}

pub fn format_products(products: &[ProductRecord]) -> String {
    if products.is_empty() {
        return "No results found.\n".to_string();
    }

    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", heavy);
    let _ = writeln!(out, "Found {} products.", products.len());
    let _ = writeln!(out, "{}\n", heavy);
    for (idx, product) in products.iter().enumerate() {
        let _ = writeln!(out, "[{}] {}", idx + 1, product.name);
        let _ = writeln!(out, "    Price:  {}", product.price);
        let _ = writeln!(out, "    Rating: {} ({})", product.rating, product.rating_count);
        let _ = writeln!(out, "    Link:   {}", product.link);
        let _ = writeln!(out, "    Image:  {}", product.image);
        let _ = writeln!(out, "{}", light);
    }
    out
}

fn prompt(stdin: &mut impl BufRead, text: &str) -> Result<Option<String>> {
    print!("{}", text);
    io::stdout().flush()?;
    let mut line = String::new();
    if stdin.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Interactive search loop. Every query gets its own browser session; a
/// failed query is reported and the loop moves on.
pub async fn run(config: &Config, crawler: &Crawler) -> Result<()> {
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("Product search crawler");
    println!("{}", "=".repeat(RULE_WIDTH));

    let stdin = io::stdin();
    let mut input = stdin.lock();

    loop {
        let Some(line) = prompt(&mut input, "\nKeyword to search (quit: 'q', 'quit' or '종료'): ")? else {
            break;
        };
        let keyword = match parse_command(&line) {
            Command::Quit => break,
            Command::Empty => {
                println!("Please enter a keyword.");
                continue;
            }
            Command::Search(keyword) => keyword,
        };

        let limit_prompt = format!("How many items? [{}]: ", config.max_items);
        let max_items = match prompt(&mut input, &limit_prompt)? {
            Some(line) => parse_limit(&line, config.max_items),
            None => config.max_items,
        };

        println!("\nSearching '{}'...", keyword);
        let mut driver = match ChromeDriver::launch(&config.chrome_options()) {
            Ok(driver) => driver,
            Err(e) => {
                error!("Could not start browser: {}", e);
                continue;
            }
        };
        match crawler.run(&mut driver, &keyword, max_items).await {
            Ok(products) => print!("{}", format_products(&products)),
            Err(e) => error!("Search for {:?} failed: {}", keyword, e),
        }
    }

    println!("Bye.");
    Ok(())
}
