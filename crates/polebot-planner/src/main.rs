mod client;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use polebot_core::{CategoryId, FailurePolicy, MissionId, NextGoalTrigger};
use polebot_protocol::{
    MapInfo, MissionGoalRef, MissionRequest, PoseInput, SaveGoalSetRequest, TransitionInput,
};
use tracing::info;

use crate::client::PlannerClient;

#[derive(Debug, Parser)]
#[command(name = "polebot-planner", about = "Plan goal sets and missions against a polebot server")]
struct Cli {
    #[arg(long, global = true, default_value = "http://127.0.0.1:3001")]
    server: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Maps(MapCommand),
    #[command(subcommand)]
    GoalSets(GoalSetCommand),
    #[command(subcommand)]
    Goals(GoalCommand),
    #[command(subcommand)]
    Missions(MissionCommand),
}

#[derive(Debug, Subcommand)]
enum MapCommand {
    List,
    Show { name: String },
}

#[derive(Debug, Subcommand)]
enum GoalSetCommand {
    List {
        #[arg(long)]
        map: Option<String>,
    },
    Show {
        name: String,
    },
    /// Replace a goal set with the poses in a file.
    ///
    /// The file is either a JSON array of poses or one `x y [yaw]` per line.
    Save {
        #[arg(long)]
        map: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        resolution: Option<f64>,
    },
    Delete {
        name: String,
    },
}

#[derive(Debug, Subcommand)]
enum GoalCommand {
    Append {
        #[arg(long)]
        set: String,
        #[arg(long, allow_negative_numbers = true)]
        x: f64,
        #[arg(long, allow_negative_numbers = true)]
        y: f64,
        /// Heading in radians.
        #[arg(long, allow_negative_numbers = true)]
        yaw: Option<f64>,
    },
    Update {
        #[arg(long)]
        set: String,
        #[arg(long)]
        seq: u32,
        #[arg(long, allow_negative_numbers = true)]
        x: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        y: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        yaw: Option<f64>,
    },
    Remove {
        #[arg(long)]
        set: String,
        #[arg(long)]
        seq: u32,
    },
}

#[derive(Debug, Subcommand)]
enum MissionCommand {
    List,
    Show {
        id: i64,
    },
    /// Create a mission that visits every goal of a set in order.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        from_set: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<i64>,
        #[arg(long, value_enum, default_value_t = TriggerArg::Auto)]
        trigger: TriggerArg,
        #[arg(long)]
        wait_time: Option<u32>,
        #[arg(long, value_enum, default_value_t = FailureArg::Skip)]
        on_failure: FailureArg,
    },
    Execute {
        id: i64,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TriggerArg {
    Auto,
    Manual,
    Wait,
    Sensor,
}

impl From<TriggerArg> for NextGoalTrigger {
    fn from(value: TriggerArg) -> Self {
        match value {
            TriggerArg::Auto => Self::Auto,
            TriggerArg::Manual => Self::Manual,
            TriggerArg::Wait => Self::Wait,
            TriggerArg::Sensor => Self::Sensor,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FailureArg {
    Skip,
    Retry,
    Abort,
}

impl From<FailureArg> for FailurePolicy {
    fn from(value: FailureArg) -> Self {
        match value {
            FailureArg::Skip => Self::Skip,
            FailureArg::Retry => Self::Retry,
            FailureArg::Abort => Self::Abort,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = PlannerClient::new(&cli.server)?;

    match cli.command {
        Command::Maps(command) => run_maps(&client, command).await,
        Command::GoalSets(command) => run_goal_sets(&client, command).await,
        Command::Goals(command) => run_goals(&client, command).await,
        Command::Missions(command) => run_missions(&client, command).await,
    }
}

async fn run_maps(client: &PlannerClient, command: MapCommand) -> Result<()> {
    match command {
        MapCommand::List => {
            for map in client.list_maps().await? {
                println!(
                    "{}\t{}x{} @ {} m/px",
                    map.name, map.metadata.width, map.metadata.height, map.metadata.resolution
                );
            }
        }
        MapCommand::Show { name } => print_json(&client.get_map(&name).await?)?,
    }
    Ok(())
}

async fn run_goal_sets(client: &PlannerClient, command: GoalSetCommand) -> Result<()> {
    match command {
        GoalSetCommand::List { map } => {
            for set in client.list_goal_sets(map.as_deref()).await?.goal_sets {
                println!("{}\t{}\t{} goals", set.name, set.map_name, set.total_goals);
            }
        }
        GoalSetCommand::Show { name } => print_json(&client.get_goal_set(&name).await?)?,
        GoalSetCommand::Save { map, name, file, description, resolution } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let goals = parse_poses(&text)?;
            let request = SaveGoalSetRequest {
                map_name: Some(map),
                set_name: Some(name.clone()),
                goals: Some(goals),
                map_info: resolution.map(|resolution| MapInfo {
                    resolution: Some(resolution),
                    ..MapInfo::default()
                }),
                description,
            };
            let saved = client.save_goal_set(&request).await?;
            info!(goal_set = %name, goal_set_id = %saved.goal_set_id, total_goals = saved.total_goals, "goal set saved");
        }
        GoalSetCommand::Delete { name } => {
            client.delete_goal_set(&name).await?;
            info!(goal_set = %name, "goal set deleted");
        }
    }
    Ok(())
}

async fn run_goals(client: &PlannerClient, command: GoalCommand) -> Result<()> {
    match command {
        GoalCommand::Append { set, x, y, yaw } => {
            let appended = client.append_goal(&set, &pose_input(Some(x), Some(y), yaw)).await?;
            println!("{}", appended.sequence_number);
        }
        GoalCommand::Update { set, seq, x, y, yaw } => {
            let updated = client.update_goal(&set, seq, &pose_input(x, y, yaw)).await?;
            print_json(&updated.goal)?;
        }
        GoalCommand::Remove { set, seq } => {
            client.remove_goal(&set, seq).await?;
            info!(goal_set = %set, sequence_number = seq, "goal removed");
        }
    }
    Ok(())
}

async fn run_missions(client: &PlannerClient, command: MissionCommand) -> Result<()> {
    match command {
        MissionCommand::List => {
            for mission in client.list_missions().await?.missions {
                println!("{}\t{}\t{} goals", mission.id, mission.name, mission.goal_count);
            }
        }
        MissionCommand::Show { id } => print_json(&client.get_mission(MissionId(id)).await?)?,
        MissionCommand::Create {
            name,
            from_set,
            description,
            category,
            trigger,
            wait_time,
            on_failure,
        } => {
            let goal_set = client.get_goal_set(&from_set).await?;
            if goal_set.goals.is_empty() {
                bail!("goal set '{from_set}' has no goals");
            }
            let transition = TransitionInput {
                next_goal_trigger: Some(trigger.into()),
                wait_time,
                on_failure: Some(on_failure.into()),
                ..TransitionInput::default()
            };
            let goals = goal_set
                .goals
                .iter()
                .map(|goal| MissionGoalRef {
                    transition: transition.clone(),
                    ..MissionGoalRef::existing(goal.id)
                })
                .collect();
            let request = MissionRequest {
                name: Some(name),
                description,
                category_id: category.map(CategoryId),
                goal_set: Some(from_set),
                goals: Some(goals),
            };
            let mission = client.create_mission(&request).await?;
            info!(mission_id = %mission.mission.id, steps = mission.goals.len(), "mission created");
        }
        MissionCommand::Execute { id } => {
            let executed = client.execute_mission(MissionId(id)).await?;
            info!(mission_id = %executed.mission_id, last_executed_ms = executed.last_executed_ms, "mission marked executed");
        }
        MissionCommand::Delete { id } => {
            client.delete_mission(MissionId(id)).await?;
            info!(mission_id = id, "mission deleted");
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Planar heading to the `(z, w)` quaternion components the server stores.
fn yaw_to_quaternion(yaw: f64) -> (f64, f64) {
    let half = yaw / 2.0;
    (half.sin(), half.cos())
}

fn pose_input(x: Option<f64>, y: Option<f64>, yaw: Option<f64>) -> PoseInput {
    let orientation = yaw.map(yaw_to_quaternion);
    PoseInput {
        x,
        y,
        orientation_z: orientation.map(|(z, _)| z),
        orientation_w: orientation.map(|(_, w)| w),
        ..PoseInput::default()
    }
}

/// Reads poses from a JSON array, or from lines of `x y [yaw]` separated by
/// whitespace or commas. Blank lines and `#` comments are skipped.
fn parse_poses(text: &str) -> Result<Vec<PoseInput>> {
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(text).context("parsing pose JSON");
    }

    let mut poses = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let fields = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty())
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("line {}: expected numbers", index + 1))?;
        match fields.as_slice() {
            [x, y] => poses.push(pose_input(Some(*x), Some(*y), None)),
            [x, y, yaw] => poses.push(pose_input(Some(*x), Some(*y), Some(*yaw))),
            _ => bail!("line {}: expected `x y [yaw]`", index + 1),
        }
    }
    if poses.is_empty() {
        bail!("no poses found");
    }
    Ok(poses)
}
