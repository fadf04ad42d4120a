//! Cross-product enumeration of the work items for a run

use shared::{AnalysisType, Hemisphere, Task};

use crate::error::{DispatchError, DispatchResult};

/// The full set of tasks for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSet {
    tasks: Vec<Task>,
}

impl TaskSet {
    /// `regions × hemispheres × models`
    pub fn functions(regions: &[String], separate_hemispheres: bool, models: &[String]) -> Self {
        let mut tasks = Vec::with_capacity(regions.len() * models.len() * 2);
        for region in regions {
            for hemisphere in Hemisphere::axis(separate_hemispheres) {
                for model in models {
                    tasks.push(Task::functions(region.clone(), hemisphere, model.clone()));
                }
            }
        }
        Self { tasks }
    }

    /// `regions × hemispheres × functions × models`
    pub fn probabilities(
        regions: &[String],
        separate_hemispheres: bool,
        functions: &[String],
        models: &[String],
    ) -> Self {
        let mut tasks = Vec::with_capacity(regions.len() * functions.len() * models.len() * 2);
        for region in regions {
            for hemisphere in Hemisphere::axis(separate_hemispheres) {
                for function in functions {
                    for model in models {
                        tasks.push(Task::probability(
                            region.clone(),
                            hemisphere,
                            function.clone(),
                            model.clone(),
                        ));
                    }
                }
            }
        }
        Self { tasks }
    }

    /// Build the task set for an analysis type, validating its inputs
    pub fn build(
        analysis_type: AnalysisType,
        regions: &[String],
        separate_hemispheres: bool,
        functions: &[String],
        models: &[String],
    ) -> DispatchResult<Self> {
        if regions.is_empty() {
            return Err(DispatchError::config("at least one region is required"));
        }
        if models.is_empty() {
            return Err(DispatchError::config("at least one model is required"));
        }

        match analysis_type {
            AnalysisType::Functions => Ok(Self::functions(regions, separate_hemispheres, models)),
            AnalysisType::Probabilities => {
                if functions.is_empty() {
                    return Err(DispatchError::config(
                        "functions must be specified for probability analysis",
                    ));
                }
                Ok(Self::probabilities(regions, separate_hemispheres, functions, models))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}

impl From<Vec<Task>> for TaskSet {
    fn from(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }
}

impl IntoIterator for TaskSet {
    type Item = Task;
    type IntoIter = std::vec::IntoIter<Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn names(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn test_functions_cardinality() {
        let regions = names("region", 3);
        let models = names("model", 4);

        assert_eq!(TaskSet::functions(&regions, false, &models).len(), 3 * 1 * 4);
        assert_eq!(TaskSet::functions(&regions, true, &models).len(), 3 * 2 * 4);
    }

    #[test]
    fn test_probabilities_cardinality() {
        let regions = names("region", 2);
        let functions = names("function", 5);
        let models = names("model", 3);

        assert_eq!(TaskSet::probabilities(&regions, false, &functions, &models).len(), 2 * 1 * 5 * 3);
        assert_eq!(TaskSet::probabilities(&regions, true, &functions, &models).len(), 2 * 2 * 5 * 3);
    }

    #[test]
    fn test_tasks_are_distinct() {
        let set = TaskSet::probabilities(&names("r", 3), true, &names("f", 2), &names("m", 2));
        let unique: HashSet<_> = set.iter().cloned().collect();
        assert_eq!(unique.len(), set.len());
    }

    #[test]
    fn test_duplicate_inputs_are_not_deduplicated() {
        let regions = vec!["V1".to_string(), "V1".to_string()];
        let set = TaskSet::functions(&regions, false, &["dummy".to_string()]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_build_validates_inputs() {
        let regions = names("r", 1);
        let models = names("m", 1);

        assert!(TaskSet::build(AnalysisType::Probabilities, &regions, false, &[], &models).is_err());
        assert!(TaskSet::build(AnalysisType::Functions, &[], false, &[], &models).is_err());
        assert!(TaskSet::build(AnalysisType::Functions, &regions, false, &[], &[]).is_err());

        let set = TaskSet::build(AnalysisType::Functions, &regions, true, &[], &models).unwrap();
        assert!(set.iter().all(|task| task.function.is_none()));
        assert!(set.iter().all(|task| task.analysis_type == AnalysisType::Functions));
    }
}
