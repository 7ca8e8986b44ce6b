//! The five progressive-disclosure operations an agent may call, with their tool
//! definitions and a text-returning dispatcher.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::cache::SkillCache;
use crate::capability::{CapabilityLoader, CapabilityRegistry, RegistrationReport};
use crate::error::SkillError;
use crate::manifest::{SkillInstructions, SkillMetadata, SkillScope};
use crate::resource::{self, DEFAULT_DISPLAY_LIMIT, ResourceKind, ResourceListing};

pub const LIST_AVAILABLE_SKILLS: &str = "list_available_skills";
pub const LOAD_SKILL_INSTRUCTIONS: &str = "load_skill_instructions";
pub const LOAD_SKILL_REFERENCE: &str = "load_skill_reference";
pub const LIST_SKILL_RESOURCES: &str = "list_skill_resources";
pub const GET_SKILL_RESOURCE_PATH: &str = "get_skill_resource_path";

#[derive(Debug, Clone)]
pub struct ToolDef {
    pub id: &'static str,
    pub description: &'static str,
    pub schema: schemars::Schema,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub tool_id: String,
    pub params: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListSkillsParams {
    /// Skill scope to list (`internal` or `external`)
    #[serde(default)]
    pub scope: SkillScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SkillParams {
    /// Skill name, e.g. `docx`
    pub skill_name: String,
    /// Requested scope; an internal skill of the same name always takes precedence
    #[serde(default)]
    pub scope: SkillScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReferenceParams {
    /// Skill name, e.g. `docx`
    pub skill_name: String,
    /// Reference document, e.g. `ooxml.md` or `references/api.md`
    pub reference_file: String,
    #[serde(default)]
    pub scope: SkillScope,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ResourcePathParams {
    /// Skill name, e.g. `docx`
    pub skill_name: String,
    /// One of `scripts`, `assets`, `references`
    pub resource_type: String,
    #[serde(default)]
    pub scope: SkillScope,
}

/// Instructions plus the functions registered as a side effect of loading them.
#[derive(Debug)]
pub struct LoadedInstructions {
    pub instructions: Arc<SkillInstructions>,
    pub registration: RegistrationReport,
}

#[derive(Debug)]
pub struct ProgressiveToolSurface {
    cache: Arc<SkillCache>,
    loader: CapabilityLoader,
    functions: Arc<CapabilityRegistry>,
    display_limit: usize,
}

impl ProgressiveToolSurface {
    #[must_use]
    pub fn new(cache: Arc<SkillCache>, loader: CapabilityLoader) -> Self {
        Self {
            cache,
            loader,
            functions: Arc::new(CapabilityRegistry::new()),
            display_limit: DEFAULT_DISPLAY_LIMIT,
        }
    }

    #[must_use]
    pub fn with_display_limit(mut self, limit: usize) -> Self {
        self.display_limit = limit;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<SkillCache> {
        &self.cache
    }

    /// Functions registered by [`Self::load_skill_instructions`] so far.
    #[must_use]
    pub fn functions(&self) -> &Arc<CapabilityRegistry> {
        &self.functions
    }

    /// Tier-1 metadata for every valid skill under `scope`.
    #[must_use]
    pub fn list_available_skills(&self, scope: SkillScope) -> Vec<Arc<SkillMetadata>> {
        self.cache.list_metadata(scope)
    }

    /// Full instructions; registers the skill's executable functions as a side effect.
    ///
    /// # Errors
    ///
    /// Unknown skill or an invalid manifest.
    pub fn load_skill_instructions(
        &self,
        name: &str,
        scope: SkillScope,
    ) -> Result<LoadedInstructions, SkillError> {
        let instructions = self.cache.get_instructions(name, scope)?;
        let metadata = self.cache.get_metadata(name, scope)?;
        let registration = self
            .loader
            .discover_and_register(&metadata, self.functions.as_ref());
        Ok(LoadedInstructions {
            instructions,
            registration,
        })
    }

    /// # Errors
    ///
    /// Unknown skill, or [`SkillError::ReferenceNotFound`] listing every probed path.
    pub fn load_skill_reference(
        &self,
        name: &str,
        reference: &str,
        scope: SkillScope,
    ) -> Result<String, SkillError> {
        let metadata = self.cache.get_metadata(name, scope)?;
        resource::load_reference(name, &metadata.source_path, reference)
    }

    /// # Errors
    ///
    /// Unknown skill or an IO error while walking the skill directory.
    pub fn list_skill_resources(
        &self,
        name: &str,
        scope: SkillScope,
    ) -> Result<ResourceListing, SkillError> {
        let metadata = self.cache.get_metadata(name, scope)?;
        resource::list_resources(name, &metadata.source_path, self.display_limit)
    }

    /// # Errors
    ///
    /// Unknown skill, [`SkillError::InvalidArgument`] for an unknown resource type, or
    /// [`SkillError::ResourceNotFound`] when the directory does not exist.
    pub fn get_skill_resource_path(
        &self,
        name: &str,
        resource_type: &str,
        scope: SkillScope,
    ) -> Result<PathBuf, SkillError> {
        let metadata = self.cache.get_metadata(name, scope)?;
        let kind: ResourceKind = resource_type.parse()?;
        resource::resource_dir(name, &metadata.source_path, kind)
    }

    #[must_use]
    pub fn tool_definitions() -> Vec<ToolDef> {
        vec![
            ToolDef {
                id: LIST_AVAILABLE_SKILLS,
                description: "List the name and description of every available skill. \
                              Does not return instructions.",
                schema: schemars::schema_for!(ListSkillsParams),
            },
            ToolDef {
                id: LOAD_SKILL_INSTRUCTIONS,
                description: "Load the full instructions of a skill and make its functions \
                              callable. Call this before using a skill.",
                schema: schemars::schema_for!(SkillParams),
            },
            ToolDef {
                id: LOAD_SKILL_REFERENCE,
                description: "Load a reference document of a skill, looked up at the skill \
                              root and in its references/ directory.",
                schema: schemars::schema_for!(ReferenceParams),
            },
            ToolDef {
                id: LIST_SKILL_RESOURCES,
                description: "List the reference documents, assets and scripts of a skill.",
                schema: schemars::schema_for!(SkillParams),
            },
            ToolDef {
                id: GET_SKILL_RESOURCE_PATH,
                description: "Get the absolute path of a skill's scripts, assets or \
                              references directory for filesystem access.",
                schema: schemars::schema_for!(ResourcePathParams),
            },
        ]
    }

    /// Run one of the five operations and render its result as text for the agent.
    ///
    /// # Errors
    ///
    /// [`SkillError::InvalidArgument`] for an unknown tool id or malformed parameters,
    /// otherwise whatever the operation returns.
    pub fn dispatch(&self, call: &ToolCall) -> Result<String, SkillError> {
        tracing::debug!(tool = %call.tool_id, "dispatching skill tool");
        match call.tool_id.as_str() {
            LIST_AVAILABLE_SKILLS => {
                let p: ListSkillsParams = deserialize_params(&call.params)?;
                Ok(render_skill_list(&self.list_available_skills(p.scope), p.scope))
            }
            LOAD_SKILL_INSTRUCTIONS => {
                let p: SkillParams = deserialize_params(&call.params)?;
                let loaded = self.load_skill_instructions(&p.skill_name, p.scope)?;
                Ok(render_instructions(&loaded))
            }
            LOAD_SKILL_REFERENCE => {
                let p: ReferenceParams = deserialize_params(&call.params)?;
                let content = self.load_skill_reference(&p.skill_name, &p.reference_file, p.scope)?;
                Ok(format!(
                    "Reference {} of skill {}:\n\n{content}",
                    p.reference_file, p.skill_name
                ))
            }
            LIST_SKILL_RESOURCES => {
                let p: SkillParams = deserialize_params(&call.params)?;
                Ok(self.list_skill_resources(&p.skill_name, p.scope)?.to_string())
            }
            GET_SKILL_RESOURCE_PATH => {
                let p: ResourcePathParams = deserialize_params(&call.params)?;
                let path = self.get_skill_resource_path(&p.skill_name, &p.resource_type, p.scope)?;
                Ok(format!(
                    "{}/ directory of skill {}:\n{}",
                    p.resource_type,
                    p.skill_name,
                    path.display()
                ))
            }
            other => Err(SkillError::InvalidArgument(format!("unknown tool: {other}"))),
        }
    }
}

fn deserialize_params<T: serde::de::DeserializeOwned>(
    params: &HashMap<String, serde_json::Value>,
) -> Result<T, SkillError> {
    let obj =
        serde_json::Value::Object(params.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
    serde_json::from_value(obj).map_err(|e| SkillError::InvalidArgument(e.to_string()))
}

fn render_skill_list(skills: &[Arc<SkillMetadata>], scope: SkillScope) -> String {
    if skills.is_empty() {
        return format!("No {scope} skills found.");
    }
    let mut out = format!("{} {scope} skills:\n", skills.len());
    for skill in skills {
        let _ = writeln!(out, "- {}: {}", skill.name, skill.description);
    }
    out.push_str("\nCall load_skill_instructions to read a skill before using it.");
    out
}

fn render_instructions(loaded: &LoadedInstructions) -> String {
    let mut out = format!(
        "Instructions for skill {} ({}):\n\n{}",
        loaded.instructions.name, loaded.instructions.scope, loaded.instructions.body
    );
    if !loaded.registration.registered.is_empty() {
        let _ = write!(
            out,
            "\n\nFunctions now available: {}",
            loaded.registration.registered.join(", ")
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::resolver::SkillResolver;

    fn make_skill(root: &Path, scope: &str, name: &str, description: &str) -> PathBuf {
        let dir = root.join(scope).join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("SKILL.md"),
            format!("---\nname: {name}\ndescription: {description}\n---\n# {name}\nUse it."),
        )
        .unwrap();
        dir
    }

    fn surface(root: &Path) -> ProgressiveToolSurface {
        let cache = Arc::new(SkillCache::new(SkillResolver::new(root)));
        ProgressiveToolSurface::new(cache, CapabilityLoader::default())
    }

    fn call(tool_id: &str, params: serde_json::Value) -> ToolCall {
        let serde_json::Value::Object(map) = params else {
            panic!("params must be an object");
        };
        ToolCall {
            tool_id: tool_id.into(),
            params: map.into_iter().collect(),
        }
    }

    #[test]
    fn five_tool_definitions() {
        let ids: Vec<_> = ProgressiveToolSurface::tool_definitions()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(
            ids,
            vec![
                LIST_AVAILABLE_SKILLS,
                LOAD_SKILL_INSTRUCTIONS,
                LOAD_SKILL_REFERENCE,
                LIST_SKILL_RESOURCES,
                GET_SKILL_RESOURCE_PATH,
            ]
        );
        let reference = &ProgressiveToolSurface::tool_definitions()[2];
        let props = reference.schema.as_object().unwrap()["properties"]
            .as_object()
            .unwrap();
        assert!(props.contains_key("reference_file"));
    }

    #[test]
    fn list_does_not_touch_instructions_tier() {
        let dir = tempfile::tempdir().unwrap();
        make_skill(dir.path(), "external", "pdf", "PDF tools");
        make_skill(dir.path(), "external", "docx", "Word tools");
        let surface = surface(dir.path());

        let listed = surface.list_available_skills(SkillScope::External);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "docx");
        assert_eq!(surface.cache().manifest_reads(), 2);

        surface.list_available_skills(SkillScope::External);
        assert_eq!(surface.cache().manifest_reads(), 2);
    }

    #[test]
    fn loading_instructions_registers_functions() {
        let dir = tempfile::tempdir().unwrap();
        let skill = make_skill(dir.path(), "external", "sop", "SOP review");
        std::fs::create_dir(skill.join("scripts")).unwrap();
        std::fs::write(
            skill.join("scripts/tools.json"),
            r#"{"symbols": [
                {"name": "check_sop", "command": ["sh", "check.sh"]},
                {"name": "_internal", "command": ["sh", "x.sh"]}
            ]}"#,
        )
        .unwrap();
        let surface = surface(dir.path());

        let loaded = surface
            .load_skill_instructions("sop", SkillScope::External)
            .unwrap();
        assert_eq!(loaded.instructions.body, "# sop\nUse it.");
        assert_eq!(loaded.registration.count(), 1);
        assert_eq!(surface.functions().names(), vec!["check_sop"]);

        let again = surface
            .load_skill_instructions("sop", SkillScope::External)
            .unwrap();
        assert_eq!(again.registration.count(), 1);
        assert_eq!(surface.functions().len(), 1);
    }

    #[test]
    fn resource_path_validates_type_and_skill() {
        let dir = tempfile::tempdir().unwrap();
        let skill = make_skill(dir.path(), "external", "docx", "Word tools");
        std::fs::create_dir(skill.join("assets")).unwrap();
        let surface = surface(dir.path());

        let path = surface
            .get_skill_resource_path("docx", "assets", SkillScope::External)
            .unwrap();
        assert!(path.ends_with("assets"));

        assert!(matches!(
            surface.get_skill_resource_path("docx", "binaries", SkillScope::External),
            Err(SkillError::InvalidArgument(_))
        ));
        assert!(matches!(
            surface.get_skill_resource_path("docx", "scripts", SkillScope::External),
            Err(SkillError::ResourceNotFound { .. })
        ));
        assert!(matches!(
            surface.get_skill_resource_path("nope", "assets", SkillScope::External),
            Err(SkillError::NotFound { .. })
        ));
    }

    #[test]
    fn dispatch_renders_text() {
        let dir = tempfile::tempdir().unwrap();
        let skill = make_skill(dir.path(), "external", "docx", "Word tools");
        std::fs::write(skill.join("ooxml.md"), "OOXML notes").unwrap();
        let surface = surface(dir.path());

        let out = surface
            .dispatch(&call(LIST_AVAILABLE_SKILLS, serde_json::json!({})))
            .unwrap();
        assert!(out.contains("- docx: Word tools"));

        let out = surface
            .dispatch(&call(
                LOAD_SKILL_REFERENCE,
                serde_json::json!({"skill_name": "docx", "reference_file": "ooxml.md"}),
            ))
            .unwrap();
        assert!(out.ends_with("OOXML notes"));

        let out = surface
            .dispatch(&call(
                LIST_SKILL_RESOURCES,
                serde_json::json!({"skill_name": "docx"}),
            ))
            .unwrap();
        assert!(out.contains("ooxml.md"));

        let out = surface
            .dispatch(&call(
                LIST_AVAILABLE_SKILLS,
                serde_json::json!({"scope": "internal"}),
            ))
            .unwrap();
        assert_eq!(out, "No internal skills found.");
    }

    #[test]
    fn dispatch_rejects_unknown_tool_and_bad_params() {
        let dir = tempfile::tempdir().unwrap();
        let surface = surface(dir.path());

        let err = surface
            .dispatch(&call("delete_skill", serde_json::json!({})))
            .unwrap_err();
        assert!(matches!(err, SkillError::InvalidArgument(_)));

        let err = surface
            .dispatch(&call(LOAD_SKILL_INSTRUCTIONS, serde_json::json!({})))
            .unwrap_err();
        assert!(matches!(err, SkillError::InvalidArgument(_)));

        let err = surface
            .dispatch(&call(
                LOAD_SKILL_INSTRUCTIONS,
                serde_json::json!({"skill_name": "ghost"}),
            ))
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
