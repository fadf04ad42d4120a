//! Prompt templates and per-task rendering

use std::collections::HashMap;
use std::path::Path;

use shared::{run_debug, AnalysisType, Task};
use crate::error::{DispatchError, DispatchResult};
use crate::traits::PromptSource;

/// Name selecting the built-in templates
pub const DEFAULT_TEMPLATE_NAME: &str = "default";

pub const DEFAULT_FUNCTIONS_TEMPLATE: &str = "\
You are an expert in neuroscience literature analysis. Your task is to
list out the top 5 functions that region **{region}**
{hemisphere_part} **{species}** brain is involved in.

These functions should be based on a simulated review of neuroscience
literature, reflecting how frequently these functions are associated with
this brain region across **peer-reviewed** studies, textbooks, and
reputable sources.

### Guidelines
1. Consider only **{species}**-specific neuroscience literature. Do **not**
use data from other species.
2. **DO NOT** provide explanations, citations, or any extra text. **Return
only the function names**.
3. Return your results as a list: [function_1, function_2, function_3,
function_4, function_5]
4. **DO NOT** repeat functions in your list.
5. List out the functions **only** for the specified {hemisphere_part}
hemisphere.

### Expected Output Format
[function_1, function_2, function_3, function_4, function_5]
";

pub const DEFAULT_PROBABILITY_TEMPLATE: &str = "\
You are an expert in neuroscience literature analysis. Your task is to
estimate the probability that the brain region **{region}**
{hemisphere_part} **{species}** brain is involved in **{function}**.

These functions should be based on a simulated review of neuroscience
literature, reflecting how frequently these functions are associated with
this brain region across **peer-reviewed** studies, textbooks, and
reputable sources.

### Guidelines
1. Consider only **{species}**-specific neuroscience literature. Do
**not** use data from other species.
2. The probability should be a **single decimal number** between **0 and
1**.
3. This number should **approximate the relative frequency** with which
this function is linked to the given brain region in literature.
4. **DO NOT** provide explanations, citations, or any extra text. **Return
only the probability value**.

### Expected Output Format
0.XX
";

/// Fills `{region}`, `{hemisphere_part}`, `{species}` and `{function}` placeholders
#[derive(Debug, Clone)]
pub struct TemplatePromptSource {
    species: String,
    templates: HashMap<AnalysisType, String>,
}

impl TemplatePromptSource {
    /// Built-in templates for both analysis types
    pub fn with_defaults(species: impl Into<String>) -> Self {
        let templates = HashMap::from([
            (AnalysisType::Functions, DEFAULT_FUNCTIONS_TEMPLATE.to_string()),
            (AnalysisType::Probabilities, DEFAULT_PROBABILITY_TEMPLATE.to_string()),
        ]);
        Self { species: species.into(), templates }
    }

    /// Use `template` for one analysis type, keeping the other as it is
    pub fn with_template(mut self, analysis_type: AnalysisType, template: impl Into<String>) -> Self {
        self.templates.insert(analysis_type, template.into());
        self
    }

    /// Templates named `name`, read from `<prompts_dir>/<analysis>/<name>.txt`
    ///
    /// `default` resolves to the built-in templates without touching disk.
    pub fn load(
        prompts_dir: &Path,
        name: &str,
        analysis_type: AnalysisType,
        species: impl Into<String>,
    ) -> DispatchResult<Self> {
        let source = Self::with_defaults(species);
        if name == DEFAULT_TEMPLATE_NAME {
            return Ok(source);
        }

        let path = prompts_dir.join(analysis_type.to_string()).join(format!("{name}.txt"));
        let template = std::fs::read_to_string(&path).map_err(|e| DispatchError::Prompt {
            message: format!("Template {name} for {analysis_type} not found at {}: {e}", path.display()),
        })?;
        run_debug!("Loaded prompt template {}", path.display());
        Ok(source.with_template(analysis_type, template))
    }

    pub fn species(&self) -> &str {
        &self.species
    }
}

/// Phrase placing the region in a hemisphere, or in the whole brain
pub fn hemisphere_part(task: &Task) -> String {
    match task.hemisphere {
        Some(hemisphere) => format!("in the **{hemisphere} hemisphere** of the"),
        None => "in the".to_string(),
    }
}

impl PromptSource for TemplatePromptSource {
    fn render(&self, task: &Task) -> DispatchResult<String> {
        let template = self.templates.get(&task.analysis_type).ok_or_else(|| DispatchError::Prompt {
            message: format!("No template for {} analysis", task.analysis_type),
        })?;

        let mut prompt = template
            .replace("{species}", &self.species)
            .replace("{region}", &task.region)
            .replace("{hemisphere_part}", &hemisphere_part(task));

        if template.contains("{function}") {
            let function = task.function.as_deref().ok_or_else(|| DispatchError::Prompt {
                message: format!("Task {task} has no function for its probability prompt"),
            })?;
            prompt = prompt.replace("{function}", function);
        }

        Ok(prompt)
    }
}
