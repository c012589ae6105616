// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use clap::Parser;
use leapc::core::config::Config;
use leapc::core::driver;
use leapc::core::error::CompileError;
use leapc::core::ir::Program;
use leapc::core::passes::PASSES;
use log::{error, info};

/// LEAP middle-end: IR passes and image codec.
#[derive(Parser)]
#[command(name = "leapc")]
#[command(about = "LEAP coprocessor compiler middle-end", long_about = None)]
struct Args {
    /// Image to load the program from. With no image, starts from an
    /// empty program.
    image: Option<PathBuf>,

    /// Run the given `;`/newline-separated pass invocations in order.
    #[arg(short = 'p', long = "run-passes", default_value = "")]
    run_passes: String,

    /// Read a pass script from a file, then run it before `--run-passes`.
    #[arg(short = 's', long = "script", default_value = "")]
    script: String,

    /// List every registered pass with its one-line doc, then exit.
    #[arg(short = 'H', long = "list-passes")]
    list_passes: bool,
}

fn list_passes() {
    for pass in PASSES {
        eprintln!("{}", pass.name);
        eprintln!("{}", pass.doc);
    }
}

fn run(args: Args) -> Result<(), CompileError> {
    if args.list_passes {
        list_passes();
        return Ok(());
    }

    let mut prg = match &args.image {
        Some(path) => {
            info!("loading program from {}", path.display());
            let bytes = std::fs::read(path)
                .map_err(|e| CompileError::user(format!("failed to read {}: {e}", path.display())))?;
            let img = leapc::core::image::Image::read(&bytes)?;
            Program::from_image(&img)?
        }
        None => Program::new(),
    };

    if !args.script.is_empty() {
        let text = std::fs::read_to_string(&args.script)
            .map_err(|e| CompileError::user(format!("failed to read {}: {e}", args.script)))?;
        driver::run_script(&mut prg, &text)?;
    }

    if !args.run_passes.is_empty() {
        driver::run_script(&mut prg, &args.run_passes)?;
    }

    Ok(())
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cfg = Config::load("leapc.toml").unwrap_or_else(|e| {
        error!("failed to load configuration, using defaults: {e}");
        Config::default()
    });
    info!(
        "leapc v{} (register_banks={}, routine_gap={})",
        env!("CARGO_PKG_VERSION"),
        cfg.register_banks,
        cfg.routine_gap
    );

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{e}");
        std::process::exit(1);
    }
    std::process::exit(0);
}
