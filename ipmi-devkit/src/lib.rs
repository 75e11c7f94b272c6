/*!
# IPMI DevKit - test support for the exporter

Lets the collection engine be exercised without any BMC or FreeIPMI install:
- `MockRunner`: scripted, recording stand-in for the command runner
- `fixtures`: captured output of `ipmimonitoring`, `ipmi-dcmi`, `ipmi-chassis`
*/

pub mod fixtures;
pub mod mock_runner;

pub use mock_runner::{Invocation, MockResponse, MockRunner};
