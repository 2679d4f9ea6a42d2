use std::error::Error;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use ofp4str::openflow0x04::oxm::{hex, unhex};
use ofp4str::openflow0x04::{FlowMod, FlowModCmd, GroupDescriptor, GroupModCmd, GroupType, Message};
use ofp4str::{encode_flow_mod, encode_group_mod, Codecs};

#[derive(Parser, Debug)]
#[command(version, about = "Convert OpenFlow 1.3 flow and group text to wire messages and back")]
struct Cli {
    /// Raise the log level (warn, info, debug, trace); RUST_LOG overrides it.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode flow text as a flow-mod and print it as hex. A leading
    /// `command=NAME` in the text overrides `--command`.
    FlowMod {
        #[arg(long, value_enum, default_value_t = FlowCommand::Add)]
        command: FlowCommand,
        #[arg(long, default_value_t = 0)]
        xid: u32,
        text: String,
    },
    /// Encode bucket texts as a group-mod and print it as hex.
    GroupMod {
        #[arg(long, default_value = "add")]
        command: GroupModCmd,
        #[arg(long = "type", default_value = "all")]
        group_type: GroupType,
        #[arg(long, default_value_t = 0)]
        group_id: u32,
        #[arg(long, default_value_t = 0)]
        xid: u32,
        buckets: Vec<String>,
    },
    /// Decode hex messages and print them as text.
    Decode {
        #[arg(required = true)]
        messages: Vec<String>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FlowCommand {
    Add,
    Modify,
    ModifyStrict,
    Delete,
    DeleteStrict,
}

impl From<FlowCommand> for FlowModCmd {
    fn from(command: FlowCommand) -> FlowModCmd {
        match command {
            FlowCommand::Add => FlowModCmd::AddFlow,
            FlowCommand::Modify => FlowModCmd::ModFlow,
            FlowCommand::ModifyStrict => FlowModCmd::ModStrictFlow,
            FlowCommand::Delete => FlowModCmd::DeleteFlow,
            FlowCommand::DeleteStrict => FlowModCmd::DeleteStrictFlow,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Command) -> Result<(), Box<dyn Error>> {
    let codecs = Codecs::basic();
    match command {
        Command::FlowMod { command, xid, text } => {
            let flow_mod = FlowMod::parse_text(&text, FlowModCmd::from(command), xid, &codecs)?;
            debug!(command = ?flow_mod.command, "parsed flow");
            println!("{}", hex(&encode_flow_mod(&flow_mod.rule, flow_mod.command, xid)?));
        }
        Command::GroupMod {
            command,
            group_type,
            group_id,
            xid,
            buckets,
        } => {
            let group = GroupDescriptor::parse(group_id, group_type, buckets.as_slice(), &codecs)?;
            println!("{}", hex(&encode_group_mod(&group, command, xid)?));
        }
        Command::Decode { messages } => {
            for text in messages {
                let bytes = unhex(text.trim()).ok_or_else(|| format!("not hex: {}", text))?;
                let msg = Message::parse(&bytes, &codecs)?;
                info!(xid = msg.xid(), more = msg.more(), "decoded message");
                if msg.more() {
                    println!("xid={},more", msg.xid());
                } else {
                    println!("xid={}", msg.xid());
                }
                println!("{}", msg.to_text(&codecs)?);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ofp4str: {}", e);
            ExitCode::FAILURE
        }
    }
}
