//! Train and evaluate OMPO agents on real/sim environment pairs.
//!
//! ```bash
//! ompo train --env-name PendulumTransfer-v0 --seed 1
//! ompo eval --run-dir results/PendulumTransfer-v0/OMPO/default/<run>
//! ompo robust-demo --env-name CartPoleTransfer-v0
//! ```
mod run_config;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use ompo_core::{evaluator::DefaultEvaluator, Agent, Configurable, Env, Policy, Trainer};
use ompo_robust_env::{
    transfer::{transfer_pair, SimKind},
    CartPole, CartPoleConfig, Pendulum, PendulumConfig, PerturbableEnv, RobustConfig,
    RobustEnv, RobustEnvConfig, RobustInput, RobustType,
};
use ompo_tch_agent::{
    discriminator::{DiscriminatorConfig, SasDiscriminator},
    mlp::{Mlp, Mlp2, MlpConfig},
    ompo::{ActorConfig, CriticConfig, EntCoefMode, Ompo, OmpoConfig, PolicyType},
    opt::OptimizerConfig,
    Device,
};
use ompo_tensorboard::TensorboardRecorder;
use run_config::RunConfig;
use serde::Serialize;
use std::{
    fs::File,
    path::{Path, PathBuf},
};

type OmpoAgent<S> = Ompo<RobustEnv<S>, Mlp, Mlp2>;

/// Train/eval OMPO agents under sim-to-real dynamics shift
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train an agent and save the best model in `<run>/checkpoint/best`
    Train(RunArgs),

    /// Evaluate the best model of a run on the real environment
    Eval {
        /// Directory of the run, containing `config.log`
        #[arg(long)]
        run_dir: PathBuf,

        /// Number of evaluation episodes
        #[arg(long, default_value_t = 10)]
        n_episodes: usize,
    },

    /// Step a simulator with random actions and action noise
    RobustDemo {
        /// Environment name
        #[arg(long, default_value = "PendulumTransfer-v0")]
        env_name: String,

        /// Number of steps
        #[arg(long, default_value_t = 1000)]
        n_steps: usize,

        /// Scale of the action noise
        #[arg(long, default_value_t = 0.1)]
        noise_factor: f32,

        /// Random seed
        #[arg(long, default_value_t = 0)]
        seed: i64,
    },
}

/// Flags overriding [`RunConfig`].
#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// YAML file of the run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Environment name, e.g. PendulumTransfer-v0
    #[arg(long)]
    env_name: Option<String>,

    /// Device: cpu, cuda, cuda:N or auto
    #[arg(long)]
    device: Option<String>,

    /// Policy type: Gaussian or Deterministic
    #[arg(long)]
    policy: Option<PolicyType>,

    /// Tag of the experiment
    #[arg(long)]
    tag: Option<String>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Steps taken with random actions
    #[arg(long)]
    start_steps: Option<usize>,

    /// Tunes the entropy coefficient automatically
    #[arg(long)]
    automatic_entropy_tuning: Option<bool>,

    /// Real environment steps of the run
    #[arg(long)]
    num_steps: Option<usize>,

    /// Constant added to every stored reward
    #[arg(long, allow_hyphen_values = true)]
    reward_offset: Option<f32>,
}

impl RunArgs {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };

        if let Some(v) = &self.env_name {
            config.env_name = v.clone();
        }
        if let Some(v) = &self.device {
            config.device = parse_device(v)?;
        }
        if let Some(v) = self.policy {
            config.policy = v;
        }
        if let Some(v) = &self.tag {
            config.tag = v.clone();
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.start_steps {
            config.start_steps = v;
        }
        if let Some(v) = self.automatic_entropy_tuning {
            config.automatic_entropy_tuning = v;
        }
        if let Some(v) = self.num_steps {
            config.num_steps = v;
        }
        if let Some(v) = self.reward_offset {
            config.reward_offset = v;
        }
        Ok(config)
    }
}

fn parse_device(s: &str) -> Result<Device> {
    match s {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Ok(Device::Cuda(0)),
        "auto" => Ok(Device::cuda_if_available(0)),
        _ => match s.strip_prefix("cuda:") {
            Some(n) => Ok(Device::Cuda(
                n.parse().with_context(|| format!("invalid device: {}", s))?,
            )),
            None => Err(anyhow!("invalid device: {}", s)),
        },
    }
}

/// Returns `(obs_dim, act_dim, act_low, act_high)`.
fn env_params<S: PerturbableEnv>(
    env_config: &RobustEnvConfig<S::Config>,
) -> Result<(usize, usize, Vec<f32>, Vec<f32>)> {
    let env = RobustEnv::<S>::build(env_config, 0)?;
    let (low, high) = env.sim().act_bounds();
    Ok((env.obs_dim(), env.act_dim(), low, high))
}

fn create_agent_config(
    config: &RunConfig,
    obs_dim: usize,
    act_dim: usize,
    act_low: Vec<f32>,
    act_high: Vec<f32>,
) -> OmpoConfig<Mlp, Mlp2> {
    let (obs_dim, act_dim) = (obs_dim as i64, act_dim as i64);
    let units = vec![config.hidden_size, config.hidden_size];
    let opt_config = OptimizerConfig::Adam { lr: config.lr };
    let actor_config = ActorConfig::default()
        .opt_config(opt_config.clone())
        .pi_config(MlpConfig::new(obs_dim, units.clone(), act_dim));
    let critic_config = CriticConfig::default()
        .opt_config(opt_config)
        .q_config(MlpConfig::new(obs_dim + act_dim, units, 1));
    let ent_coef_mode = match config.automatic_entropy_tuning {
        true => EntCoefMode::Auto(-(act_dim as f64), config.lr),
        false => EntCoefMode::Fix(config.alpha),
    };

    OmpoConfig::default()
        .actor_config(actor_config)
        .critic_config(critic_config)
        .discount_factor(config.gamma)
        .tau(config.tau)
        .ent_coef_mode(ent_coef_mode)
        .policy_type(config.policy)
        .action_bounds(act_low, act_high)
        .seed(config.seed as i64)
        .device(config.device.into())
}

fn create_discriminator_config(
    config: &RunConfig,
    obs_dim: usize,
    act_dim: usize,
) -> DiscriminatorConfig {
    let units = vec![config.disc_hidden_size, config.disc_hidden_size];
    DiscriminatorConfig::new(obs_dim, act_dim, units)
        .opt_config(OptimizerConfig::Adam { lr: config.lr })
        .seed(config.seed as i64)
        .device(config.device.into())
}

/// Trains an agent and returns the result directory of the run.
fn train<S>(config: &RunConfig, sim_config: S::Config) -> Result<PathBuf>
where
    S: PerturbableEnv,
{
    let result_dir = config.create_result_dir()?;
    info!("Result directory: {:?}", result_dir);

    let (real_config, sim_config) =
        transfer_pair::<S>(&config.env_name, sim_config, config.max_steps)?;
    let (obs_dim, act_dim, act_low, act_high) = env_params::<S>(&sim_config)?;

    let agent_config = create_agent_config(config, obs_dim, act_dim, act_low, act_high);
    agent_config.save(result_dir.join("agent.yaml"))?;
    let mut agent = OmpoAgent::<S>::build(agent_config)?;
    let mut discriminator =
        SasDiscriminator::build(create_discriminator_config(config, obs_dim, act_dim))?;

    let model_dir = result_dir.join("checkpoint");
    let trainer_config = config.trainer_config(model_dir.to_string_lossy());
    let mut evaluator = DefaultEvaluator::<RobustEnv<S>>::new(
        &real_config,
        config.seed as i64,
        config.eval_episodes,
    )?;
    let mut recorder = TensorboardRecorder::new(&result_dir);
    let mut trainer = Trainer::<RobustEnv<S>>::build(trainer_config, real_config, sim_config)?;

    trainer.train(&mut agent, &mut discriminator, &mut evaluator, &mut recorder)?;
    Ok(result_dir)
}

/// Return of an evaluation episode.
#[derive(Debug, Serialize)]
struct EvalRecord {
    episode: usize,
    steps: usize,
    reward: f32,
}

/// Evaluates the best model of a run on the real environment and writes
/// `eval.csv` in the run directory.
fn eval<S>(
    run_dir: &Path,
    config: &RunConfig,
    sim_config: S::Config,
    n_episodes: usize,
) -> Result<f32>
where
    S: PerturbableEnv,
{
    let (real_config, _) = transfer_pair::<S>(&config.env_name, sim_config, config.max_steps)?;
    let (obs_dim, act_dim, act_low, act_high) = env_params::<S>(&real_config)?;

    let mut agent = {
        let agent_config = create_agent_config(config, obs_dim, act_dim, act_low, act_high);
        let mut agent = OmpoAgent::<S>::build(agent_config)?;
        agent.load_params(&run_dir.join("checkpoint").join("best"))?;
        agent.eval();
        agent
    };

    let mut env = RobustEnv::<S>::build(&real_config, config.seed as i64)?;
    let mut wtr = csv::Writer::from_writer(File::create(run_dir.join("eval.csv"))?);
    let mut r_total = 0f32;
    for episode in 0..n_episodes {
        let mut obs = env.reset_with_index(episode)?;
        let mut record = EvalRecord {
            episode,
            steps: 0,
            reward: 0.0,
        };
        loop {
            let act = agent.sample(&obs);
            let (step, _) = env.step(&act)?;
            record.steps += 1;
            record.reward += step.reward;
            if step.is_done() {
                break;
            }
            obs = step.obs;
        }
        r_total += record.reward;
        wtr.serialize(&record)?;
    }
    wtr.flush()?;

    let avg = if n_episodes == 0 {
        0.0
    } else {
        r_total / n_episodes as f32
    };
    info!("----------------------------------------");
    info!("Test Episodes: {}, Avg. Reward: {:.2}", n_episodes, avg);
    info!("----------------------------------------");
    Ok(avg)
}

/// Steps the simulator with random actions corrupted by action noise.
///
/// Returns the number of finished episodes.
fn robust_demo<S>(
    sim_config: S::Config,
    n_steps: usize,
    noise_factor: f32,
    seed: i64,
) -> Result<usize>
where
    S: PerturbableEnv,
{
    let robust = RobustConfig::default()
        .robust_type(RobustType::Action)
        .noise_factor(noise_factor);
    let env_config = RobustEnvConfig::new(sim_config).robust(robust);
    let mut env = RobustEnv::<S>::build(&env_config, seed)?;

    env.reset()?;
    let (mut episodes, mut reward) = (0, 0f32);
    for _ in 0..n_steps {
        let input = RobustInput::new(env.sample_act(), RobustType::Action);
        let (step, _) = env.step_robust(&input)?;
        reward += step.reward;
        if step.is_done() {
            episodes += 1;
            info!("{} episode {}: reward {:.2}", S::name(), episodes, reward);
            reward = 0.0;
            env.reset()?;
        }
    }
    Ok(episodes)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match args.command {
        Command::Train(run_args) => {
            let config = run_args.run_config()?;
            info!("Training {} with {:?} policy", config.env_name, config.policy);
            match SimKind::from_env_name(&config.env_name)? {
                SimKind::Pendulum => train::<Pendulum>(&config, PendulumConfig::default())?,
                SimKind::CartPole => train::<CartPole>(&config, CartPoleConfig::default())?,
            };
        }
        Command::Eval {
            run_dir,
            n_episodes,
        } => {
            let config = RunConfig::load(run_dir.join("config.log"))?;
            match SimKind::from_env_name(&config.env_name)? {
                SimKind::Pendulum => {
                    eval::<Pendulum>(&run_dir, &config, PendulumConfig::default(), n_episodes)?
                }
                SimKind::CartPole => {
                    eval::<CartPole>(&run_dir, &config, CartPoleConfig::default(), n_episodes)?
                }
            };
        }
        Command::RobustDemo {
            env_name,
            n_steps,
            noise_factor,
            seed,
        } => {
            let episodes = match SimKind::from_env_name(&env_name)? {
                SimKind::Pendulum => {
                    robust_demo::<Pendulum>(PendulumConfig::default(), n_steps, noise_factor, seed)?
                }
                SimKind::CartPole => {
                    robust_demo::<CartPole>(CartPoleConfig::default(), n_steps, noise_factor, seed)?
                }
            };
            info!("Finished {} episodes in {} steps", episodes, n_steps);
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    fn small_config(results_dir: &Path) -> RunConfig {
        RunConfig {
            results_dir: results_dir.to_string_lossy().to_string(),
            num_steps: 80,
            start_steps: 20,
            hidden_size: 16,
            disc_hidden_size: 16,
            batch_size: 16,
            gail_batch: 8,
            replay_size: 1000,
            local_replay_size: 20,
            update_repeat: 1,
            sim_episodes_per_real: 1,
            eval_episodes: 2,
            max_steps: Some(20),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_ompo_pendulum() -> Result<()> {
        let dir = TempDir::new("ompo_pendulum")?;
        let config = small_config(dir.path());

        let run_dir = train::<Pendulum>(&config, PendulumConfig::default())?;
        assert!(run_dir.join("config.log").exists());
        assert!(run_dir.join("checkpoint/best/pi.pt.tch").exists());
        assert!(run_dir.join("checkpoint/best/discriminator.pt.tch").exists());

        let avg = eval::<Pendulum>(&run_dir, &config, PendulumConfig::default(), 2)?;
        assert!(avg.is_finite());
        let mut rdr = csv::Reader::from_path(run_dir.join("eval.csv"))?;
        assert_eq!(rdr.records().count(), 2);
        Ok(())
    }

    #[test]
    fn test_run_args_override_file() -> Result<()> {
        let dir = TempDir::new("run_args")?;
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "env_name: CartPoleTransfer-v0\nseed: 3\n")?;

        let run_args = RunArgs {
            config: Some(path),
            seed: Some(9),
            device: Some("cuda:1".to_string()),
            policy: Some(PolicyType::Deterministic),
            reward_offset: Some(-1.5),
            ..RunArgs::default()
        };
        let config = run_args.run_config()?;
        assert_eq!(config.env_name, "CartPoleTransfer-v0");
        assert_eq!(config.seed, 9);
        assert_eq!(config.device, Device::Cuda(1));
        assert_eq!(config.policy, PolicyType::Deterministic);
        assert_eq!(config.reward_offset, -1.5);
        assert!(parse_device("tpu").is_err());
        Ok(())
    }

    #[test]
    fn test_robust_demo_resets_episodes() -> Result<()> {
        let sim_config = PendulumConfig::default().max_steps(20);
        let episodes = robust_demo::<Pendulum>(sim_config, 100, 0.1, 0)?;
        assert_eq!(episodes, 5);
        Ok(())
    }
}
