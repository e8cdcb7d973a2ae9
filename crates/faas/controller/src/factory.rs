//! Workload factory
//!
//! Builds the execution-unit specification for one new run of a Function.

use faas_types::{
    labels_for_function, Container, EnvVar, ExecutionUnit, Function, ObjectMeta, OwnerReference,
    RestartPolicy, UnitSpec, UnitStatus,
};
use rand::Rng;

/// API group/version stamped into owner references
pub const FUNCTION_API_VERSION: &str = "faas.dev/v1alpha1";

/// Kind stamped into owner references
pub const FUNCTION_KIND: &str = "Function";

/// Name of the single container in every unit
pub const CONTAINER_NAME: &str = "function";

/// Environment key exposing the handler name to the runtime
pub const HANDLER_ENV: &str = "FUNCTION_HANDLER";

/// Environment key exposing the dependency list to the runtime
pub const DEPENDENCIES_ENV: &str = "FUNCTION_DEPENDENCIES";

/// Length of the random name suffix
pub const SUFFIX_LEN: usize = 5;

// Consonants and digits only, so suffixes never spell words
const SUFFIX_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";

/// Generate a random unit name suffix
pub fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// Builds units for Functions
#[derive(Debug, Clone)]
pub struct WorkloadFactory {
    runtime_command: Vec<String>,
}

impl WorkloadFactory {
    pub fn new(runtime_command: Vec<String>) -> Self {
        Self { runtime_command }
    }

    /// Build a unit with a freshly generated name
    pub fn build(&self, function: &Function) -> ExecutionUnit {
        self.build_with_suffix(function, &random_suffix())
    }

    /// Build a unit named `<function>-function-<suffix>`
    pub fn build_with_suffix(&self, function: &Function, suffix: &str) -> ExecutionUnit {
        let spec = &function.spec;

        let mut metadata = ObjectMeta::new(
            &function.metadata.namespace,
            format!("{}-function-{}", function.metadata.name, suffix),
        );
        metadata.labels = labels_for_function(&function.metadata.name);
        metadata.owner_references = vec![owner_reference(function)];

        let mut command = self.runtime_command.clone();
        command.push(spec.code.clone());
        command.extend(spec.args.iter().cloned());

        ExecutionUnit {
            metadata,
            spec: UnitSpec {
                containers: vec![Container {
                    name: CONTAINER_NAME.to_string(),
                    image: spec.runtime_image.clone(),
                    command,
                    env: environment(function),
                }],
                restart_policy: RestartPolicy::Never,
            },
            status: UnitStatus::default(),
        }
    }
}

impl Default for WorkloadFactory {
    fn default() -> Self {
        Self::new(vec!["python".to_string(), "-u".to_string(), "-c".to_string()])
    }
}

fn owner_reference(function: &Function) -> OwnerReference {
    OwnerReference {
        api_version: FUNCTION_API_VERSION.to_string(),
        kind: FUNCTION_KIND.to_string(),
        name: function.metadata.name.clone(),
        uid: function.metadata.uid,
        controller: true,
        block_owner_deletion: true,
    }
}

fn environment(function: &Function) -> Vec<EnvVar> {
    let spec = &function.spec;
    let mut env: Vec<EnvVar> = spec
        .env_variables
        .iter()
        .map(|(name, value)| EnvVar::new(name, value))
        .collect();

    // User-supplied keys win
    if !spec.handler.is_empty() && !spec.env_variables.contains_key(HANDLER_ENV) {
        env.push(EnvVar::new(HANDLER_ENV, &spec.handler));
    }
    if !spec.dependencies.is_empty() && !spec.env_variables.contains_key(DEPENDENCIES_ENV) {
        env.push(EnvVar::new(DEPENDENCIES_ENV, spec.dependencies.join(",")));
    }

    env
}
