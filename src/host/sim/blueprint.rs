//! Static descriptions of simulated containers
//!
//! Every time a container is loaded its live entities are built fresh from
//! these blueprints, so anything changed during play reverts to the
//! blueprint defaults on reload.

use std::collections::BTreeMap;

use crate::snapshot::{FsmValue, SequenceProgress, Vec3};

#[derive(Debug, Clone)]
pub struct MachineBlueprint {
    pub name: String,
    pub states: Vec<String>,
    pub initial: String,
    pub variables: BTreeMap<String, FsmValue>,
    /// Whether an animation component is attached
    pub animated: bool,
}

impl MachineBlueprint {
    pub fn new(name: impl Into<String>, states: &[&str]) -> Self {
        let states: Vec<String> = states.iter().map(|s| s.to_string()).collect();
        Self {
            name: name.into(),
            initial: states.first().cloned().unwrap_or_default(),
            states,
            variables: BTreeMap::new(),
            animated: false,
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: FsmValue) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn animated(mut self) -> Self {
        self.animated = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CombatantBlueprint {
    pub path: String,
    pub kind: String,
    pub health: i32,
    pub position: Vec3,
    pub physics: bool,
    pub recoil: bool,
    pub machines: Vec<MachineBlueprint>,
}

impl CombatantBlueprint {
    pub fn new(path: impl Into<String>, kind: impl Into<String>, health: i32) -> Self {
        Self {
            path: path.into(),
            kind: kind.into(),
            health,
            position: Vec3::ZERO,
            physics: true,
            recoil: true,
            machines: Vec::new(),
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn without_physics(mut self) -> Self {
        self.physics = false;
        self
    }

    pub fn without_recoil(mut self) -> Self {
        self.recoil = false;
        self
    }

    pub fn with_machine(mut self, machine: MachineBlueprint) -> Self {
        self.machines.push(machine);
        self
    }
}

#[derive(Debug, Clone)]
pub struct SequenceBlueprint {
    pub path: String,
    pub progress: SequenceProgress,
    pub machine: Option<MachineBlueprint>,
}

#[derive(Debug, Clone)]
pub struct ContainerBlueprint {
    pub name: String,
    pub default_spawn: Vec3,
    pub gates: BTreeMap<String, Vec3>,
    pub combatants: Vec<CombatantBlueprint>,
    /// Persistent flag ids with their default values
    pub flags: Vec<(String, bool)>,
    pub sequence: Option<SequenceBlueprint>,
}

impl ContainerBlueprint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_spawn: Vec3::ZERO,
            gates: BTreeMap::new(),
            combatants: Vec::new(),
            flags: Vec::new(),
            sequence: None,
        }
    }

    pub fn with_spawn(mut self, position: Vec3) -> Self {
        self.default_spawn = position;
        self
    }

    pub fn with_gate(mut self, gate: impl Into<String>, position: Vec3) -> Self {
        self.gates.insert(gate.into(), position);
        self
    }

    pub fn with_combatant(mut self, combatant: CombatantBlueprint) -> Self {
        self.combatants.push(combatant);
        self
    }

    pub fn with_flag(mut self, id: impl Into<String>, default: bool) -> Self {
        self.flags.push((id.into(), default));
        self
    }

    pub fn with_sequence(
        mut self,
        path: impl Into<String>,
        progress: SequenceProgress,
        machine: Option<MachineBlueprint>,
    ) -> Self {
        self.sequence = Some(SequenceBlueprint {
            path: path.into(),
            progress,
            machine,
        });
        self
    }

    /// Spawn position for an arrival through `gate`
    pub fn spawn_for(&self, gate: Option<&str>) -> Vec3 {
        gate.and_then(|g| self.gates.get(g))
            .copied()
            .unwrap_or(self.default_spawn)
    }
}
