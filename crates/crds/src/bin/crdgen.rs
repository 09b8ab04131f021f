//! Prints the operator's CRD manifests as a multi-document YAML stream.

use crds::{Machine, MachineSet};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    println!("{}", serde_yaml::to_string(&Machine::crd())?);
    println!("---");
    println!("{}", serde_yaml::to_string(&MachineSet::crd())?);
    Ok(())
}
