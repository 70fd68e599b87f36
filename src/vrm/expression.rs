//! Facial expressions (VRM 1.0 expressions, VRM 0.x blend shape groups).

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::scene::{NodeHandle, Scene};

/// Built-in expression names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionPreset {
    Aa,
    Ih,
    Ou,
    Ee,
    Oh,
    Blink,
    BlinkLeft,
    BlinkRight,
    Happy,
    Angry,
    Sad,
    Relaxed,
    Surprised,
    LookUp,
    LookDown,
    LookLeft,
    LookRight,
    Neutral,
}

impl ExpressionPreset {
    pub const ALL: [ExpressionPreset; 18] = [
        Self::Aa,
        Self::Ih,
        Self::Ou,
        Self::Ee,
        Self::Oh,
        Self::Blink,
        Self::BlinkLeft,
        Self::BlinkRight,
        Self::Happy,
        Self::Angry,
        Self::Sad,
        Self::Relaxed,
        Self::Surprised,
        Self::LookUp,
        Self::LookDown,
        Self::LookLeft,
        Self::LookRight,
        Self::Neutral,
    ];

    pub const BLINK: [ExpressionPreset; 3] = [Self::Blink, Self::BlinkLeft, Self::BlinkRight];
    pub const LOOK_AT: [ExpressionPreset; 4] = [Self::LookUp, Self::LookDown, Self::LookLeft, Self::LookRight];
    pub const MOUTH: [ExpressionPreset; 5] = [Self::Aa, Self::Ih, Self::Ou, Self::Ee, Self::Oh];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aa => "aa",
            Self::Ih => "ih",
            Self::Ou => "ou",
            Self::Ee => "ee",
            Self::Oh => "oh",
            Self::Blink => "blink",
            Self::BlinkLeft => "blinkLeft",
            Self::BlinkRight => "blinkRight",
            Self::Happy => "happy",
            Self::Angry => "angry",
            Self::Sad => "sad",
            Self::Relaxed => "relaxed",
            Self::Surprised => "surprised",
            Self::LookUp => "lookUp",
            Self::LookDown => "lookDown",
            Self::LookLeft => "lookLeft",
            Self::LookRight => "lookRight",
            Self::Neutral => "neutral",
        }
    }

    /// Maps a VRM 0.x `presetName` (`"unknown"` yields `None`).
    #[must_use]
    pub fn from_vrm0(preset_name: &str) -> Option<ExpressionPreset> {
        Some(match preset_name.to_ascii_lowercase().as_str() {
            "a" => Self::Aa,
            "i" => Self::Ih,
            "u" => Self::Ou,
            "e" => Self::Ee,
            "o" => Self::Oh,
            "blink" => Self::Blink,
            "blink_l" => Self::BlinkLeft,
            "blink_r" => Self::BlinkRight,
            "joy" => Self::Happy,
            "angry" => Self::Angry,
            "sorrow" => Self::Sad,
            "fun" => Self::Relaxed,
            "lookup" => Self::LookUp,
            "lookdown" => Self::LookDown,
            "lookleft" => Self::LookLeft,
            "lookright" => Self::LookRight,
            "neutral" => Self::Neutral,
            _ => return None,
        })
    }
}

impl fmt::Display for ExpressionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpressionPreset {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter().copied().find(|p| p.as_str() == s).ok_or(())
    }
}

/// How an active expression suppresses a group of other expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpressionOverride {
    #[default]
    None,
    /// Fully suppress while this expression has any weight.
    Block,
    /// Suppress proportionally to this expression's weight.
    Blend,
}

impl ExpressionOverride {
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("block") => Self::Block,
            Some("blend") => Self::Blend,
            _ => Self::None,
        }
    }

    /// Strength of the suppression this expression exerts at `weight`.
    #[must_use]
    pub fn amount(self, weight: f32) -> f32 {
        match self {
            Self::None => 0.0,
            Self::Block => {
                if weight > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Blend => weight,
        }
    }
}

/// Adds `weight` to morph target `index` of every mesh node in `primitives`.
#[derive(Debug, Clone)]
pub struct MorphTargetBind {
    pub primitives: SmallVec<[NodeHandle; 2]>,
    pub index: usize,
    pub weight: f32,
}

#[derive(Debug, Clone)]
pub struct Expression {
    name: String,
    pub weight: f32,
    pub is_binary: bool,
    pub override_blink: ExpressionOverride,
    pub override_look_at: ExpressionOverride,
    pub override_mouth: ExpressionOverride,
    pub binds: Vec<MorphTargetBind>,
}

impl Expression {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: 0.0,
            is_binary: false,
            override_blink: ExpressionOverride::None,
            override_look_at: ExpressionOverride::None,
            override_mouth: ExpressionOverride::None,
            binds: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective weight: binary expressions snap to 0 or 1 around 0.5.
    #[must_use]
    pub fn output_weight(&self) -> f32 {
        if self.is_binary {
            if self.weight > 0.5 { 1.0 } else { 0.0 }
        } else {
            self.weight
        }
    }

    fn apply_weight(&self, scene: &mut Scene, multiplier: f32) {
        let mut actual = self.output_weight() * multiplier;
        if self.is_binary && actual < 1.0 {
            actual = 0.0;
        }
        for bind in &self.binds {
            for &handle in &bind.primitives {
                if let Some(node) = scene.get_node_mut(handle)
                    && let Some(slot) = node.morph_weights.get_mut(bind.index)
                {
                    *slot += bind.weight * actual;
                }
            }
        }
    }

    fn clear_applied_weight(&self, scene: &mut Scene) {
        for bind in &self.binds {
            for &handle in &bind.primitives {
                if let Some(node) = scene.get_node_mut(handle) {
                    node.set_morph_weight(bind.index, 0.0);
                }
            }
        }
    }
}

/// Owns an avatar's expressions and writes their combined result into the
/// morph weights of the scene.
#[derive(Debug, Clone, Default)]
pub struct ExpressionManager {
    expressions: Vec<Expression>,
    by_name: FxHashMap<String, usize>,
}

impl ExpressionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an expression; a later registration with the same name
    /// replaces the earlier one.
    pub fn register(&mut self, expression: Expression) {
        if let Some(&index) = self.by_name.get(expression.name()) {
            log::warn!("Expression '{}' registered twice; keeping the last one", expression.name());
            self.expressions[index] = expression;
        } else {
            self.by_name.insert(expression.name().to_string(), self.expressions.len());
            self.expressions.push(expression);
        }
    }

    #[must_use]
    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Expression> {
        self.by_name.get(name).map(|&i| &self.expressions[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Expression> {
        self.by_name.get(name).map(|&i| &mut self.expressions[i])
    }

    #[must_use]
    pub fn get_value(&self, name: &str) -> Option<f32> {
        self.get(name).map(|e| e.weight)
    }

    /// Sets an expression's weight. Unknown names are ignored.
    pub fn set_value(&mut self, name: &str, weight: f32) {
        if let Some(expression) = self.get_mut(name) {
            expression.weight = weight;
        }
    }

    pub fn reset_values(&mut self) {
        for expression in &mut self.expressions {
            expression.weight = 0.0;
        }
    }

    /// Per-group multipliers `(blink, look_at, mouth)` from the overrides of
    /// every active expression.
    #[must_use]
    pub fn override_multipliers(&self) -> (f32, f32, f32) {
        let mut blink = 1.0_f32;
        let mut look_at = 1.0_f32;
        let mut mouth = 1.0_f32;

        for expression in &self.expressions {
            let w = expression.output_weight();
            blink *= 1.0 - expression.override_blink.amount(w);
            look_at *= 1.0 - expression.override_look_at.amount(w);
            mouth *= 1.0 - expression.override_mouth.amount(w);
        }

        (blink.max(0.0), look_at.max(0.0), mouth.max(0.0))
    }

    /// Zeroes every bound morph weight, then accumulates each expression.
    pub fn update(&self, scene: &mut Scene) {
        let (blink, look_at, mouth) = self.override_multipliers();

        for expression in &self.expressions {
            expression.clear_applied_weight(scene);
        }

        for expression in &self.expressions {
            let mut multiplier = 1.0;
            let name = expression.name();
            if in_group(&ExpressionPreset::BLINK, name) {
                multiplier *= blink;
            }
            if in_group(&ExpressionPreset::LOOK_AT, name) {
                multiplier *= look_at;
            }
            if in_group(&ExpressionPreset::MOUTH, name) {
                multiplier *= mouth;
            }
            expression.apply_weight(scene, multiplier);
        }
    }
}

fn in_group(group: &[ExpressionPreset], name: &str) -> bool {
    group.iter().any(|p| p.as_str() == name)
}
