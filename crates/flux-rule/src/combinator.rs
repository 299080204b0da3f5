use crate::condition::{evaluate, ConditionOutcome, Reason};
use crate::context::SnapshotView;
use crate::error::{Result, RuleError};
use crate::model::{Condition, LogicOperator};

/// 条件集合的组合结果
#[derive(Debug)]
pub struct CombineResult {
    pub matched: bool,
    /// 第一个求值错误；出错时 `matched` 为 false
    pub error: Option<RuleError>,
}

impl CombineResult {
    fn matched(matched: bool) -> Self {
        Self {
            matched,
            error: None,
        }
    }

    fn failed(error: RuleError) -> Self {
        Self {
            matched: false,
            error: Some(error),
        }
    }
}

/// 在视图中求值单个条件，处理条件的设备覆盖
pub fn evaluate_in(view: SnapshotView<'_>, condition: &Condition) -> Result<ConditionOutcome> {
    match view.resolve(condition) {
        Some(snapshot) => evaluate(condition, snapshot),
        None => Ok(ConditionOutcome::not_matched(Reason::DeviceUnknown)),
    }
}

/// 组合规则的有序条件
pub fn combine(conditions: &[Condition], view: SnapshotView<'_>) -> CombineResult {
    combine_with(conditions, |condition| evaluate_in(view, condition))
}

/// 从左到右折叠：`(((c1 op1 c2) op2 c3) op3 c4)`，没有优先级。
///
/// `ci` 与 `ci+1` 之间的连接符取自 `ci.logic_operator`。累积值为 false 且连接符为 AND，
/// 或累积值为 true 且连接符为 OR 时，跳过下一个条件的求值。
/// 空列表恒为 false；遇到第一个错误即停止。
pub fn combine_with<F>(conditions: &[Condition], mut eval: F) -> CombineResult
where
    F: FnMut(&Condition) -> Result<ConditionOutcome>,
{
    let Some((first, rest)) = conditions.split_first() else {
        return CombineResult::matched(false);
    };

    let mut acc = match eval(first) {
        Ok(outcome) => outcome.matched,
        Err(e) => return CombineResult::failed(e),
    };
    let mut op = first.logic_operator;

    for condition in rest {
        let short_circuit = match op {
            LogicOperator::And => !acc,
            LogicOperator::Or => acc,
        };

        // 未短路时累积值对结果没有影响（true AND x == x，false OR x == x）
        if !short_circuit {
            acc = match eval(condition) {
                Ok(outcome) => outcome.matched,
                Err(e) => return CombineResult::failed(e),
            };
        }

        op = condition.logic_operator;
    }

    CombineResult::matched(acc)
}
