//! A boolean solver session for step-assignment problems.
//!
//! The constraint shapes produced by the encoder are fixed: boolean decision
//! variables partitioned into exactly-one groups (one group per recipe step),
//! individual variables asserted false, and blocking clauses that forbid
//! complete models already seen. This module provides a small solver session
//! specialised to exactly those shapes.
//!
//! Models are enumerated in a deterministic order: groups are explored in
//! creation order and group members in creation order, so repeated runs over
//! the same problem yield models in the same sequence. One session is created
//! per search run and dropped on exit.

/// A boolean decision variable within a [`SolverSession`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Variable(usize);

/// The outcome of a satisfiability check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    /// A model was found; query it with [`SolverSession::is_true`]
    Satisfiable,
    /// No model satisfies the asserted constraints
    Unsatisfiable,
}

/// Per-variable bookkeeping
#[derive(Default)]
struct VariableState {
    /// The (group, member slot) this variable occupies, once grouped
    position: Option<(usize, usize)>,
    /// Whether the variable has been asserted false
    forbidden: bool,
}

/// A solver session holding the asserted constraints and the last model
#[derive(Default)]
pub struct SolverSession {
    variables: Vec<VariableState>,
    groups: Vec<Vec<Variable>>,
    /// Sets of variables that must not all be true simultaneously
    nogoods: Vec<Vec<Variable>>,
    contradiction: bool,
    /// Chosen member slot per group, set by a satisfiable check
    model: Option<Vec<usize>>,
}

impl SolverSession {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Introduce a fresh boolean variable
    pub fn new_variable(&mut self) -> Variable {
        let variable = Variable(self.variables.len());
        self.variables.push(VariableState::default());
        variable
    }

    /// Assert that the given variable is false in every model
    pub fn assert_false(&mut self, variable: Variable) {
        self.variables[variable.0].forbidden = true;
    }

    /// Assert that exactly one of the given variables is true.
    ///
    /// Every variable must belong to at most one group. Asserting an empty group
    /// makes the problem unsatisfiable.
    pub fn assert_exactly_one(&mut self, members: Vec<Variable>) {
        if members.is_empty() {
            self.contradiction = true;
            return;
        }

        let group = self.groups.len();
        for (slot, member) in members.iter().enumerate() {
            let state = &mut self.variables[member.0];
            assert!(
                state.position.is_none(),
                "Variable already belongs to a group"
            );
            state.position = Some((group, slot));
        }
        self.groups.push(members);
    }

    /// Forbid any model in which all the given variables are true.
    ///
    /// Called with the true variables of a model, this blocks exactly that model.
    pub fn block(&mut self, variables: &[Variable]) {
        self.nogoods.push(variables.to_vec());
    }

    /// Search for a model satisfying all asserted constraints.
    ///
    /// On [`SatResult::Satisfiable`] the model can be inspected with
    /// [`SolverSession::is_true`] until the next call to `check`.
    pub fn check(&mut self) -> SatResult {
        self.model = None;
        if self.contradiction {
            return SatResult::Unsatisfiable;
        }
        if self.groups.is_empty() {
            if self.is_blocked(&[]) {
                return SatResult::Unsatisfiable;
            }
            self.model = Some(Vec::new());
            return SatResult::Satisfiable;
        }

        let mut choice = vec![0; self.groups.len()];
        let mut level = 0;
        loop {
            // Advance to the next admissible member of the current group
            let group = &self.groups[level];
            while choice[level] < group.len() && self.variables[group[choice[level]].0].forbidden {
                choice[level] += 1;
            }

            if choice[level] >= group.len() {
                // Group exhausted; backtrack
                if level == 0 {
                    return SatResult::Unsatisfiable;
                }
                choice[level] = 0;
                level -= 1;
                choice[level] += 1;
                continue;
            }

            if level + 1 < self.groups.len() {
                level += 1;
                continue;
            }

            if self.is_blocked(&choice) {
                choice[level] += 1;
                continue;
            }

            self.model = Some(choice);
            return SatResult::Satisfiable;
        }
    }

    /// Whether the given variable is true in the last model.
    ///
    /// # Panics
    ///
    /// Panics if the last check did not produce a model.
    pub fn is_true(&self, variable: Variable) -> bool {
        let model = self
            .model
            .as_ref()
            .expect("No model available; call check first");
        match self.variables[variable.0].position {
            Some((group, slot)) => model[group] == slot,
            None => false,
        }
    }

    /// The variables that are true in the last model
    pub fn true_variables(&self) -> Vec<Variable> {
        let model = self
            .model
            .as_ref()
            .expect("No model available; call check first");
        model
            .iter()
            .enumerate()
            .map(|(group, slot)| self.groups[group][*slot])
            .collect()
    }

    /// Whether a complete choice vector is forbidden by a blocking clause
    fn is_blocked(&self, choice: &[usize]) -> bool {
        let is_true = |variable: &Variable| match self.variables[variable.0].position {
            Some((group, slot)) => choice[group] == slot,
            None => false,
        };

        self.nogoods
            .iter()
            .any(|nogood| nogood.iter().all(is_true))
    }
}
