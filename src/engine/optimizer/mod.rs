// ==========================================
// 生产排程引擎 - 遗传优化器
// ==========================================
// 流程: 播种 → [选择 → 交叉 → 变异 → 修复 → 评估] × N 代
// 并行: 每代个体评估用 rayon 并行,代与代之间严格串行
// 终止: 最大代数 / 停滞收敛 / 外部取消 / 超时
// 可复现: 同一种子 + 同一输入 → 同一结果
// ==========================================

pub mod chromosome;
pub mod fitness;
pub mod operators;

pub use chromosome::{Chromosome, Gene, SearchSpace};
pub use fitness::FitnessEvaluator;

use crate::config::OptimizerConfig;
use crate::domain::types::RunStatus;
use crate::engine::strategy::SeedingOrder;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

// ==========================================
// 运行控制
// ==========================================

/// 取消标志; 在每代开始前检查
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 进度回调: (已完成代数, 历史最优适应度)
pub type ProgressObserver = Arc<dyn Fn(usize, f64) + Send + Sync>;

#[derive(Clone, Default)]
pub struct SearchControl {
    pub cancel: CancelFlag,
    pub observer: Option<ProgressObserver>,
}

impl SearchControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }
}

// ==========================================
// OptimizationOutcome - 一次搜索的结果
// ==========================================
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    pub best: Chromosome,
    pub generations: usize,
    /// 下标 0 为初代,之后每代一个值 (历史最优,单调不增)
    pub fitness_history: Vec<f64>,
    pub status: RunStatus,
    pub seed: u64,
}

// ==========================================
// Optimizer - 遗传优化器
// ==========================================
#[derive(Debug, Clone)]
pub struct Optimizer {
    config: OptimizerConfig,
    evaluator: FitnessEvaluator,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig, evaluator: FitnessEvaluator) -> Self {
        Self { config, evaluator }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// 执行搜索 (同步、CPU 密集; 异步环境中应放在 spawn_blocking 内调用)
    pub fn run(
        &self,
        space: &SearchSpace,
        seeding: SeedingOrder,
        control: &SearchControl,
    ) -> OptimizationOutcome {
        let seed = self.config.seed.unwrap_or_else(time_seed);
        let mut rng = StdRng::seed_from_u64(seed);
        let started = Instant::now();
        let budget = Duration::from_millis(self.config.timeout_ms);
        let pop_size = self.config.population_size.max(2);
        let elite = self.config.elite_count.min(pop_size);

        let mut population = self.initial_population(space, seeding, pop_size, &mut rng);
        population
            .par_iter_mut()
            .for_each(|c| self.evaluator.evaluate_chromosome(space, c));

        let mut best = best_of(&population).clone();
        let mut history = vec![best.fitness];
        let mut stagnation = 0usize;
        let mut generations = 0usize;
        let mut status = RunStatus::Completed;

        for gen in 0..self.config.max_generations {
            if control.cancel.is_cancelled() {
                status = RunStatus::Cancelled;
                break;
            }
            if started.elapsed() >= budget {
                status = RunStatus::TimedOut;
                break;
            }

            population.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
            let mut next: Vec<Chromosome> = population[..elite].to_vec();
            while next.len() < pop_size {
                let a = operators::tournament(&population, self.config.tournament_size, &mut rng);
                let b = operators::tournament(&population, self.config.tournament_size, &mut rng);
                let mut genes = operators::uniform_crossover(
                    &population[a].genes,
                    &population[b].genes,
                    &mut rng,
                );
                operators::mutate(&mut genes, space, self.config.mutation_rate, &mut rng);
                operators::repair(&mut genes, space);
                next.push(Chromosome::new(genes));
            }
            next[elite..]
                .par_iter_mut()
                .for_each(|c| self.evaluator.evaluate_chromosome(space, c));
            population = next;
            generations = gen + 1;

            let gen_best = best_of(&population);
            if gen_best.fitness < best.fitness {
                best = gen_best.clone();
                stagnation = 0;
            } else {
                stagnation += 1;
            }
            history.push(best.fitness);

            if let Some(observer) = &control.observer {
                observer(generations, best.fitness);
            }
            debug!(generation = generations, best = best.fitness, stagnation, "代际完成");

            if self.config.stagnation_generations > 0
                && stagnation >= self.config.stagnation_generations
            {
                status = RunStatus::Converged;
                break;
            }
        }

        info!(
            seed,
            generations,
            status = %status,
            best_fitness = best.fitness,
            high_conflicts = best.breakdown.high_conflicts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "遗传搜索结束"
        );

        OptimizationOutcome {
            best,
            generations,
            fitness_history: history,
            status,
            seed,
        }
    }

    fn initial_population(
        &self,
        space: &SearchSpace,
        seeding: SeedingOrder,
        pop_size: usize,
        rng: &mut StdRng,
    ) -> Vec<Chromosome> {
        let order = seeding.order(&space.plans, &space.min_minutes());
        let mut population = Vec::with_capacity(pop_size);
        population.push(Chromosome::new(operators::earliest_feasible(space, &order)));

        let ratio = self.config.heuristic_seed_ratio.clamp(0.0, 1.0);
        let heuristic = ((pop_size as f64 * ratio).round() as usize).min(pop_size - 1);
        for _ in 0..heuristic {
            let mut shuffled = order.clone();
            shuffled.shuffle(rng);
            population.push(Chromosome::new(operators::earliest_feasible(space, &shuffled)));
        }
        while population.len() < pop_size {
            population.push(Chromosome::new(operators::random_genes(space, rng)));
        }
        population
    }
}

fn best_of(population: &[Chromosome]) -> &Chromosome {
    population
        .iter()
        .min_by(|a, b| a.fitness.total_cmp(&b.fitness))
        .unwrap_or(&population[0])
}

fn time_seed() -> u64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64
}
