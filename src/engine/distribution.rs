// ==========================================
// 生产级联排产引擎 - 混合分配 (多工作中心)
// ==========================================
// 依据: 级联排产设计 - 4.4 步骤3 Hybrid distribution
// 规则:
// 1) 主工作中心单独能在交期前完工 -> 直接采用
// 2) 否则枚举候选工作中心的所有组合，组内按"最早完工"逐批分配
// 3) 满足交期的组合中取 (实际使用资源数, 完工时间) 最小者
// 4) 均不满足时取 (完工时间, 资源数) 最小者，并由上层输出交期不可行告警
// ==========================================

use crate::domain::{InsertionPolicy, TimeSlot};
use crate::engine::timeline::{NewBatch, ResourceTimeline};
use chrono::NaiveDateTime;
use std::collections::BTreeSet;

/// 候选资源：一个工作中心及该中心上每批的就绪/时长
#[derive(Debug, Clone)]
pub struct CandidateResource {
    pub work_center_id: String,
    pub timeline: ResourceTimeline,
    pub batches: Vec<NewBatch>, // 与批次列表一一对应（不同中心效率不同，时长不同）
}

/// 单批落位
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlacement {
    pub batch_index: usize,
    pub work_center_id: String,
    pub slot: TimeSlot,
}

/// 一种分配方案
#[derive(Debug, Clone)]
pub struct Assignment {
    pub placements: Vec<BatchPlacement>, // 与批次顺序一致
    pub completion: NaiveDateTime,
    pub resources_used: usize,
}

/// 分配结果
#[derive(Debug, Clone)]
pub struct DistributionOutcome {
    pub assignment: Assignment,
    pub meets_deadline: bool,
    pub hybrid: bool, // 是否使用了多于一个工作中心或非主工作中心
}

// ==========================================
// HybridDistributor - 混合分配器
// ==========================================
#[derive(Debug, Clone)]
pub struct HybridDistributor {
    policy: InsertionPolicy,
    max_candidates: usize,
}

impl HybridDistributor {
    pub fn new(policy: InsertionPolicy, max_candidates: usize) -> Self {
        Self {
            policy,
            max_candidates: max_candidates.clamp(1, 12),
        }
    }

    /// 计算批次分配
    ///
    /// # 参数
    /// - `candidates`: 候选资源，第一个为路线主工作中心
    /// - `requested_start`: 请求开始时刻
    /// - `deadline`: 交期（None 表示只用主工作中心）
    ///
    /// # 返回
    /// - None: 无候选资源或无批次
    pub fn distribute(
        &self,
        candidates: &[CandidateResource],
        requested_start: NaiveDateTime,
        deadline: Option<NaiveDateTime>,
    ) -> Option<DistributionOutcome> {
        let primary = self.evaluate(candidates, &[0], requested_start)?;

        let deadline = match deadline {
            Some(d) if primary.completion > d && candidates.len() > 1 => d,
            Some(d) => {
                let meets_deadline = primary.completion <= d;
                return Some(DistributionOutcome {
                    assignment: primary,
                    meets_deadline,
                    hybrid: false,
                });
            }
            None => {
                return Some(DistributionOutcome {
                    assignment: primary,
                    meets_deadline: true,
                    hybrid: false,
                })
            }
        };

        let n = candidates.len().min(self.max_candidates);
        let mut best_feasible: Option<Assignment> = None;
        let mut fastest: Assignment = primary;

        for mask in 1u32..(1u32 << n) {
            let members: Vec<usize> = (0..n).filter(|i| mask & (1 << i) != 0).collect();
            let Some(candidate) = self.evaluate(candidates, &members, requested_start) else {
                continue;
            };

            if candidate.completion <= deadline {
                let better = match &best_feasible {
                    Some(best) => {
                        (candidate.resources_used, candidate.completion)
                            < (best.resources_used, best.completion)
                    }
                    None => true,
                };
                if better {
                    best_feasible = Some(candidate.clone());
                }
            }

            if (candidate.completion, candidate.resources_used)
                < (fastest.completion, fastest.resources_used)
            {
                fastest = candidate;
            }
        }

        let primary_id = &candidates[0].work_center_id;
        let (assignment, meets_deadline) = match best_feasible {
            Some(a) => (a, true),
            None => (fastest, false),
        };
        let hybrid = assignment.resources_used > 1
            || assignment
                .placements
                .iter()
                .any(|p| &p.work_center_id != primary_id);

        Some(DistributionOutcome {
            assignment,
            meets_deadline,
            hybrid,
        })
    }

    /// 评估一个候选组合：逐批分配给组内最早完工的资源
    fn evaluate(
        &self,
        candidates: &[CandidateResource],
        members: &[usize],
        requested_start: NaiveDateTime,
    ) -> Option<Assignment> {
        let batch_count = candidates.first()?.batches.len();
        if batch_count == 0 || members.is_empty() {
            return None;
        }

        let mut cursors: Vec<NaiveDateTime> = members
            .iter()
            .map(|&m| candidates[m].timeline.earliest_free(requested_start, self.policy))
            .collect();
        let mut timelines: Vec<ResourceTimeline> = members
            .iter()
            .map(|&m| candidates[m].timeline.clone())
            .collect();

        let mut placements = Vec::with_capacity(batch_count);
        let mut used = BTreeSet::new();

        for batch_index in 0..batch_count {
            let mut chosen: Option<(usize, TimeSlot)> = None;
            for (pos, &m) in members.iter().enumerate() {
                let resource = &candidates[m];
                let batch = resource.batches.get(batch_index)?;
                let slot = timelines[pos].fit(cursors[pos].max(batch.ready_at), batch.duration);
                let better = match chosen {
                    Some((_, best)) => slot.end < best.end,
                    None => true,
                };
                if better {
                    chosen = Some((pos, slot));
                }
            }

            let (pos, slot) = chosen?;
            timelines[pos].reserve(slot);
            if self.policy == InsertionPolicy::Append {
                cursors[pos] = slot.end;
            }
            used.insert(members[pos]);
            placements.push(BatchPlacement {
                batch_index,
                work_center_id: candidates[members[pos]].work_center_id.clone(),
                slot,
            });
        }

        let completion = placements.iter().map(|p| p.slot.end).max()?;
        Some(Assignment {
            placements,
            completion,
            resources_used: used.len(),
        })
    }
}
