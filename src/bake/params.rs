//! Dispatch parameters bound before each sampling dispatch.
//!
//! Parameter names resolve through a process-wide table built once on first use.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::util::{Error, Result};

/// Every parameter the sky sampling kernel reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderParam {
    SampleCount,
    SampleId,
    ProbeOffset,
    MaxBounces,
    OffsetRay,
    AverageAlbedo,
    BackFaceCulling,
    BakeSkyShadingDirection,
}

impl ShaderParam {
    pub const COUNT: usize = 8;

    pub const ALL: [ShaderParam; Self::COUNT] = [
        Self::SampleCount,
        Self::SampleId,
        Self::ProbeOffset,
        Self::MaxBounces,
        Self::OffsetRay,
        Self::AverageAlbedo,
        Self::BackFaceCulling,
        Self::BakeSkyShadingDirection,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SampleCount => "sample_count",
            Self::SampleId => "sample_id",
            Self::ProbeOffset => "probe_offset",
            Self::MaxBounces => "max_bounces",
            Self::OffsetRay => "offset_ray",
            Self::AverageAlbedo => "average_albedo",
            Self::BackFaceCulling => "back_face_culling",
            Self::BakeSkyShadingDirection => "bake_sky_shading_direction",
        }
    }

    /// Resolve a parameter by name.
    pub fn from_name(name: &str) -> Option<Self> {
        PARAM_IDS.get(name).copied()
    }

    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

static PARAM_IDS: LazyLock<HashMap<&'static str, ShaderParam>> =
    LazyLock::new(|| ShaderParam::ALL.iter().map(|&p| (p.name(), p)).collect());

/// Typed parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    U32(u32),
    F32(f32),
    Bool(bool),
}

/// Parameter values for one dispatch.
#[derive(Debug, Clone, Default)]
pub struct ParamBlock {
    values: [Option<ParamValue>; ShaderParam::COUNT],
}

impl ParamBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, param: ShaderParam, value: ParamValue) {
        self.values[param.slot()] = Some(value);
    }

    pub fn set_u32(&mut self, param: ShaderParam, value: u32) {
        self.set(param, ParamValue::U32(value));
    }

    pub fn set_f32(&mut self, param: ShaderParam, value: f32) {
        self.set(param, ParamValue::F32(value));
    }

    pub fn set_bool(&mut self, param: ShaderParam, value: bool) {
        self.set(param, ParamValue::Bool(value));
    }

    pub fn get(&self, param: ShaderParam) -> Option<ParamValue> {
        self.values[param.slot()]
    }

    pub fn u32(&self, param: ShaderParam) -> Result<u32> {
        match self.get(param) {
            Some(ParamValue::U32(v)) => Ok(v),
            other => Err(Self::mismatch(param, "u32", other)),
        }
    }

    pub fn f32(&self, param: ShaderParam) -> Result<f32> {
        match self.get(param) {
            Some(ParamValue::F32(v)) => Ok(v),
            other => Err(Self::mismatch(param, "f32", other)),
        }
    }

    pub fn bool(&self, param: ShaderParam) -> Result<bool> {
        match self.get(param) {
            Some(ParamValue::Bool(v)) => Ok(v),
            other => Err(Self::mismatch(param, "bool", other)),
        }
    }

    fn mismatch(param: ShaderParam, expected: &str, got: Option<ParamValue>) -> Error {
        match got {
            None => Error::resource(format!("parameter '{}' is not bound", param.name())),
            Some(v) => Error::resource(format!("parameter '{}' expected {expected}, bound {v:?}", param.name())),
        }
    }
}
