// ==========================================
// 生产排程引擎 - 遗传算子
// ==========================================
// 播种: 最早可行位启发式 / 随机
// 进化: 锦标赛选择 + 均匀交叉 + 逐基因变异 + 修复
// ==========================================

use super::chromosome::{Chromosome, Gene, SearchSpace};
use chrono::{Duration, NaiveDateTime};
use rand::Rng;

// ==========================================
// 播种
// ==========================================

/// 最早可行位: 按给定顺序逐个计划放到完工最早的兼容资源上
pub fn earliest_feasible(space: &SearchSpace, order: &[usize]) -> Vec<Gene> {
    let mut timelines = space.baseline().to_vec();
    let mut genes: Vec<Option<Gene>> = vec![None; space.len()];

    for &i in order {
        let lower = space.lower_bound(i);
        let best = space
            .candidates(i)
            .iter()
            .filter_map(|&r| {
                let d = space.duration(i, r)?;
                let start = timelines[r].earliest_slot(lower, d);
                Some((start + d, r, start))
            })
            .min_by_key(|&(end, r, _)| (end, r));

        if let Some((_, r, start)) = best {
            let gene = Gene { resource: r, start };
            if let Some(a) = space.candidate_assignment(i, &gene) {
                // earliest_slot 返回的位置必然空闲
                if let Err(c) = timelines[r].insert(a) {
                    tracing::debug!(plan = %space.plans[i].plan_id, conflict = %c.description, "启发式放置失败");
                }
            }
            genes[i] = Some(gene);
        }
    }

    genes
        .into_iter()
        .enumerate()
        .map(|(i, g)| g.unwrap_or_else(|| fallback_gene(space, i)))
        .collect()
}

/// 随机个体: 资源与开始时间均匀随机
pub fn random_genes<R: Rng + ?Sized>(space: &SearchSpace, rng: &mut R) -> Vec<Gene> {
    (0..space.len())
        .map(|i| {
            let candidates = space.candidates(i);
            let r = candidates[rng.random_range(0..candidates.len())];
            Gene {
                resource: r,
                start: random_start(space, i, r, rng),
            }
        })
        .collect()
}

/// 在 [下界, 最晚开始] 内按时间粒度随机取开始时间
pub fn random_start<R: Rng + ?Sized>(
    space: &SearchSpace,
    plan: usize,
    resource: usize,
    rng: &mut R,
) -> NaiveDateTime {
    let lower = space.lower_bound(plan);
    let latest = space.latest_start(plan, resource);
    let slot_minutes = space.slot().num_minutes().max(1);
    let slots = (latest - lower).num_minutes() / slot_minutes;
    if slots <= 0 {
        return lower;
    }
    nth_slot(lower, slot_minutes, rng.random_range(0..=slots))
}

/// 下界之后第 n 个时间粒度
fn nth_slot(lower: NaiveDateTime, slot_minutes: i64, n: i64) -> NaiveDateTime {
    lower + Duration::minutes(slot_minutes * n)
}

fn fallback_gene(space: &SearchSpace, plan: usize) -> Gene {
    Gene {
        resource: space.candidates(plan)[0],
        start: space.lower_bound(plan),
    }
}

// ==========================================
// 进化算子
// ==========================================

/// 锦标赛选择: 随机抽 k 个,返回适应度最小者的下标
pub fn tournament<R: Rng + ?Sized>(population: &[Chromosome], k: usize, rng: &mut R) -> usize {
    let mut best = rng.random_range(0..population.len());
    for _ in 1..k.max(1) {
        let challenger = rng.random_range(0..population.len());
        if population[challenger].fitness < population[best].fitness {
            best = challenger;
        }
    }
    best
}

/// 均匀交叉: 每个基因等概率取自任一亲本
pub fn uniform_crossover<R: Rng + ?Sized>(a: &[Gene], b: &[Gene], rng: &mut R) -> Vec<Gene> {
    a.iter()
        .zip(b)
        .map(|(x, y)| if rng.random_bool(0.5) { *x } else { *y })
        .collect()
}

/// 逐基因变异: 以 rate 概率改资源或改开始时间 (各半)
pub fn mutate<R: Rng + ?Sized>(genes: &mut [Gene], space: &SearchSpace, rate: f64, rng: &mut R) {
    let rate = rate.clamp(0.0, 1.0);
    for (i, gene) in genes.iter_mut().enumerate() {
        if !rng.random_bool(rate) {
            continue;
        }
        if rng.random_bool(0.5) {
            let candidates = space.candidates(i);
            gene.resource = candidates[rng.random_range(0..candidates.len())];
        } else {
            gene.start = random_start(space, i, gene.resource, rng);
        }
    }
}

/// 修复: 资源不兼容时换到首个候选; 开始时间拉回 [下界, 最晚开始]
pub fn repair(genes: &mut [Gene], space: &SearchSpace) {
    for (i, gene) in genes.iter_mut().enumerate() {
        if space.duration(i, gene.resource).is_none() {
            gene.resource = space.candidates(i)[0];
        }
        let lower = space.lower_bound(i);
        let latest = space.latest_start(i, gene.resource);
        gene.start = gene.start.clamp(lower, latest);
    }
}
