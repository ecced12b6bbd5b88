use clap::Parser;

use vr180_prep::{
    cli::{handle_commands, CliArgs},
    config::Config,
    utils::{setup_logging, Result},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    if args.command.is_none() {
        use clap::CommandFactory;
        let mut cmd = CliArgs::command();
        cmd.print_help().unwrap();
        println!();
        return Ok(());
    }

    args.validate()?;

    let config = Config::load_with_fallback(&args.config)?;

    setup_logging(
        args.get_log_level(&config.logging.level),
        config.logging.show_timestamps,
        config.logging.colored_output && args.should_use_color(),
    )?;

    handle_commands(&args, &config).await
}
