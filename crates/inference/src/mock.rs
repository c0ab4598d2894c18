//! Mock 转向模型
//!
//! 用于无真实模型权重的测试。`ConstantModel` 始终返回同一转向角；
//! `MockModel` 按脚本依次返回结果并统计调用次数。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use contracts::{ContractError, InputShape, ModelInput, SteeringModel};

use crate::check_input;

/// 固定转向角模型
#[derive(Debug, Clone)]
pub struct ConstantModel {
    name: String,
    value: f32,
    shape: InputShape,
}

impl ConstantModel {
    pub fn new(value: f32) -> Self {
        Self {
            name: "constant".to_string(),
            value,
            shape: InputShape::default(),
        }
    }

    pub fn with_shape(mut self, shape: InputShape) -> Self {
        self.shape = shape;
        self
    }
}

impl SteeringModel for ConstantModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_shape(&self) -> InputShape {
        self.shape
    }

    fn predict(&self, input: &ModelInput) -> Result<f32, ContractError> {
        check_input(input, &self.shape)?;
        Ok(self.value)
    }
}

/// Scripted model
///
/// Each call pops the next scripted answer; once the script runs out the
/// fallback value is returned.
#[derive(Debug)]
pub struct MockModel {
    shape: InputShape,
    script: Mutex<VecDeque<Result<f32, String>>>,
    fallback: f32,
    calls: AtomicUsize,
}

impl MockModel {
    pub fn new(fallback: f32) -> Self {
        Self {
            shape: InputShape::default(),
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    /// 追加一次成功预测
    pub fn then_return(self, value: f32) -> Self {
        self.push(Ok(value));
        self
    }

    /// 追加一次失败预测
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    pub fn with_shape(mut self, shape: InputShape) -> Self {
        self.shape = shape;
        self
    }

    /// 已调用 predict 的次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn push(&self, answer: Result<f32, String>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(answer);
    }
}

impl SteeringModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    fn input_shape(&self) -> InputShape {
        self.shape
    }

    fn predict(&self, input: &ModelInput) -> Result<f32, ContractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        check_input(input, &self.shape)?;

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(ContractError::inference(message)),
            None => Ok(self.fallback),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ColorSpace;

    fn frame() -> ModelInput {
        ModelInput::blank(&InputShape::default(), ColorSpace::Yuv)
    }

    #[test]
    fn test_constant_model() {
        let model = ConstantModel::new(-0.25);
        assert_eq!(model.predict(&frame()).unwrap(), -0.25);
        assert_eq!(model.name(), "constant");
    }

    #[test]
    fn test_constant_model_rejects_wrong_shape() {
        let model = ConstantModel::new(0.0);
        let small = ModelInput::blank(
            &InputShape {
                width: 10,
                ..Default::default()
            },
            ColorSpace::Yuv,
        );
        let err = model.predict(&small).unwrap_err();
        assert!(matches!(err, ContractError::Inference { .. }));
    }

    #[test]
    fn test_mock_script_then_fallback() {
        let model = MockModel::new(0.5).then_return(0.1).then_fail("boom");
        assert_eq!(model.predict(&frame()).unwrap(), 0.1);
        assert!(model.predict(&frame()).is_err());
        assert_eq!(model.predict(&frame()).unwrap(), 0.5);
        assert_eq!(model.calls(), 3);
    }
}
