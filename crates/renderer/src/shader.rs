//! GLSL front end shared by both backends.
//!
//! Stages are parsed and validated with naga, which also gives us the
//! reflection data that stands in for GL-style name lookups: entry-point
//! locations for attributes and varyings, and member offsets inside the
//! uniform block for uniforms.

use std::collections::HashMap;

use wgpu::naga;

use crate::error::ShaderStage;

/// The only uniform block slot the pipeline layout provides.
pub(crate) const UNIFORM_BLOCK_BINDING: (u32, u32) = (0, 0);

/// Interface of one compiled stage.
#[derive(Debug, Clone, Default)]
pub(crate) struct StageInterface {
    pub inputs: Vec<(Option<String>, u32)>,
    pub outputs: Vec<(Option<String>, u32)>,
    pub uniforms: Vec<(String, u32)>,
    pub block: Option<UniformBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UniformBlock {
    pub group: u32,
    pub binding: u32,
    pub size: u32,
}

/// Parses and validates one stage, returning a rendered diagnostic on error.
pub(crate) fn compile_stage(stage: ShaderStage, source: &str) -> Result<StageInterface, String> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(stage.as_naga());
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| errors.emit_to_string(source))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| err.emit_to_string(source))?;

    reflect(stage, &module)
}

fn reflect(stage: ShaderStage, module: &naga::Module) -> Result<StageInterface, String> {
    let entry = module
        .entry_points
        .iter()
        .find(|entry| entry.stage == stage.as_naga())
        .ok_or_else(|| format!("{stage} shader has no `main` entry point"))?;

    let mut interface = StageInterface::default();

    for argument in &entry.function.arguments {
        collect_locations(
            module,
            argument.name.as_deref(),
            argument.binding.as_ref(),
            argument.ty,
            &mut interface.inputs,
        );
    }
    if let Some(result) = &entry.function.result {
        collect_locations(
            module,
            None,
            result.binding.as_ref(),
            result.ty,
            &mut interface.outputs,
        );
    }

    for (_, variable) in module.global_variables.iter() {
        if variable.space != naga::AddressSpace::Uniform {
            continue;
        }
        let naga::TypeInner::Struct { members, span } = &module.types[variable.ty].inner else {
            continue;
        };
        let (group, binding) = variable
            .binding
            .as_ref()
            .map(|resource| (resource.group, resource.binding))
            .unwrap_or(UNIFORM_BLOCK_BINDING);
        if interface.block.is_some() {
            return Err(format!(
                "{stage} shader declares more than one uniform block"
            ));
        }
        interface.block = Some(UniformBlock {
            group,
            binding,
            size: *span,
        });
        for member in members {
            if let Some(name) = &member.name {
                interface.uniforms.push((name.clone(), member.offset));
            }
        }
    }

    Ok(interface)
}

fn collect_locations(
    module: &naga::Module,
    name: Option<&str>,
    binding: Option<&naga::Binding>,
    ty: naga::Handle<naga::Type>,
    into: &mut Vec<(Option<String>, u32)>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            into.push((name.map(str::to_owned), *location));
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    if let Some(naga::Binding::Location { location, .. }) = &member.binding {
                        into.push((member.name.clone(), *location));
                    }
                }
            }
        }
    }
}

/// Name lookups for a linked program.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProgramInterface {
    pub attributes: HashMap<String, u32>,
    pub uniforms: HashMap<String, u32>,
    pub block_size: u32,
}

impl ProgramInterface {
    /// Matches the vertex outputs against the fragment inputs and merges the
    /// uniform views of both stages.
    pub(crate) fn link(vertex: &StageInterface, fragment: &StageInterface) -> Result<Self, String> {
        let mut problems = Vec::new();

        for (name, location) in &fragment.inputs {
            let provided = vertex
                .outputs
                .iter()
                .any(|(_, output)| output == location);
            if !provided {
                problems.push(format!(
                    "fragment input `{}` at location {location} is not written by the vertex stage",
                    name.as_deref().unwrap_or("<unnamed>")
                ));
            }
        }

        let mut block_size = 0;
        for block in [vertex.block, fragment.block].into_iter().flatten() {
            if (block.group, block.binding) != UNIFORM_BLOCK_BINDING {
                problems.push(format!(
                    "uniform block must use set = {}, binding = {} (found set = {}, binding = {})",
                    UNIFORM_BLOCK_BINDING.0, UNIFORM_BLOCK_BINDING.1, block.group, block.binding
                ));
            }
            block_size = block_size.max(block.size);
        }

        let mut uniforms = HashMap::new();
        let mut owners: HashMap<u32, &str> = HashMap::new();
        for (name, offset) in vertex.uniforms.iter().chain(&fragment.uniforms) {
            match uniforms.insert(name.clone(), *offset) {
                Some(previous) if previous != *offset => problems.push(format!(
                    "uniform `{name}` has conflicting layouts between stages ({previous} vs {offset})"
                )),
                _ => {}
            }
            // Both stages share one buffer, so a byte offset has one owner.
            match owners.get(offset) {
                Some(owner) if *owner != name.as_str() => problems.push(format!(
                    "uniforms `{owner}` and `{name}` overlap at offset {offset}"
                )),
                Some(_) => {}
                None => {
                    owners.insert(*offset, name.as_str());
                }
            }
        }

        if !problems.is_empty() {
            return Err(problems.join("\n"));
        }

        let attributes = vertex
            .inputs
            .iter()
            .filter_map(|(name, location)| name.clone().map(|name| (name, *location)))
            .collect();

        Ok(Self {
            attributes,
            uniforms,
            block_size,
        })
    }
}

/// Renders `source` with 1-based line numbers for diagnostics.
pub(crate) fn numbered_source(source: &str) -> String {
    source
        .lines()
        .enumerate()
        .map(|(index, line)| format!("{}: {line}", index + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
