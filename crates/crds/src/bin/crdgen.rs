//! Prints the HyperConverged CRD manifest to stdout.

use hco_crds::HyperConverged;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&HyperConverged::crd())?);
    Ok(())
}
