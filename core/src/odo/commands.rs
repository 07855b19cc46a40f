//! Command lines for every odo invocation.
//!
//! Builders are deterministic: the same inputs always produce the same
//! argument vector, with names substituted verbatim.

use crate::domain::ComponentSource;
use crate::ports::CommandLine;

/// Logical program name; runners map it to a binary path.
pub const ODO: &str = "odo";

fn odo<const N: usize>(args: [&str; N]) -> CommandLine {
    CommandLine::new(ODO).args(args)
}

/// Appends `--app <app> --project <project>`.
fn in_app(command: CommandLine, project: &str, app: &str) -> CommandLine {
    command.args(["--app", app, "--project", project])
}

/// Appends `--component <c> --app <app> --project <project>`.
fn in_component(command: CommandLine, project: &str, app: &str, component: &str) -> CommandLine {
    in_app(command.args(["--component", component]), project, app)
}

pub fn version() -> CommandLine {
    odo(["version"])
}

pub fn catalog_list_components() -> CommandLine {
    odo(["catalog", "list", "components"])
}

pub fn catalog_list_services() -> CommandLine {
    odo(["catalog", "list", "services"])
}

pub fn catalog_describe_service(service: &str) -> CommandLine {
    odo(["catalog", "describe", "service", service])
}

// Projects

pub fn project_list() -> CommandLine {
    odo(["project", "list"])
}

pub fn project_create(project: &str) -> CommandLine {
    odo(["project", "create", project])
}

pub fn project_delete(project: &str) -> CommandLine {
    odo(["project", "delete", project, "-f"])
}

// Applications

pub fn app_list(project: &str) -> CommandLine {
    odo(["app", "list", "--project", project])
}

pub fn app_create(project: &str, app: &str) -> CommandLine {
    odo(["app", "create", app, "--project", project])
}

pub fn app_delete(project: &str, app: &str) -> CommandLine {
    odo(["app", "delete", app, "-f", "--project", project])
}

pub fn app_describe(project: &str, app: &str) -> CommandLine {
    odo(["app", "describe", app, "--project", project])
}

// Components

pub fn component_list(project: &str, app: &str) -> CommandLine {
    in_app(odo(["list"]), project, app)
}

/// `odo create <type>:<version> <name> [--git|--binary|--local <location>] ...`
pub fn component_create(
    project: &str,
    app: &str,
    name: &str,
    component_type: &str,
    version: &str,
    source: Option<&ComponentSource>,
) -> CommandLine {
    let mut command = odo(["create"])
        .arg(format!("{}:{}", component_type, version))
        .arg(name);
    if let Some(source) = source {
        command = command
            .arg(format!("--{}", source.kind.as_str()))
            .arg(source.location.as_str());
    }
    in_app(command, project, app)
}

pub fn component_delete(project: &str, app: &str, component: &str) -> CommandLine {
    in_app(odo(["delete", component, "-f"]), project, app)
}

pub fn component_describe(project: &str, app: &str, component: &str) -> CommandLine {
    in_app(odo(["describe", component]), project, app)
}

/// `odo log <component> [-f] ...`; the follow form streams until killed.
pub fn component_log(project: &str, app: &str, component: &str, follow: bool) -> CommandLine {
    let command = if follow {
        odo(["log", component, "-f"])
    } else {
        odo(["log", component])
    };
    in_app(command, project, app)
}

pub fn component_watch(project: &str, app: &str, component: &str) -> CommandLine {
    in_app(odo(["watch", component]), project, app)
}

pub fn component_push(project: &str, app: &str, component: &str) -> CommandLine {
    in_app(odo(["push", component]), project, app)
}

pub fn link(project: &str, app: &str, component: &str, target: &str) -> CommandLine {
    in_component(odo(["link", target]), project, app, component)
}

// Storage

pub fn storage_list(project: &str, app: &str, component: &str) -> CommandLine {
    in_component(odo(["storage", "list"]), project, app, component)
}

pub fn storage_create(
    project: &str,
    app: &str,
    component: &str,
    name: &str,
    mount_path: &str,
    size_gib: u32,
) -> CommandLine {
    let command = odo(["storage", "create", name])
        .arg(format!("--path={}", mount_path))
        .arg(format!("--size={}Gi", size_gib));
    in_component(command, project, app, component)
}

pub fn storage_delete(project: &str, app: &str, component: &str, name: &str) -> CommandLine {
    in_component(odo(["storage", "delete", name, "-f"]), project, app, component)
}

// URLs

pub fn url_list(project: &str, app: &str, component: &str) -> CommandLine {
    in_component(odo(["url", "list"]), project, app, component)
}

pub fn url_create(
    project: &str,
    app: &str,
    component: &str,
    name: &str,
    port: Option<u16>,
) -> CommandLine {
    let mut command = odo(["url", "create", name]);
    if let Some(port) = port {
        command = command.arg("--port").arg(port.to_string());
    }
    in_component(command, project, app, component)
}

pub fn url_delete(project: &str, app: &str, component: &str, name: &str) -> CommandLine {
    in_component(odo(["url", "delete", name, "-f"]), project, app, component)
}

// Services

pub fn service_list(project: &str, app: &str) -> CommandLine {
    in_app(odo(["service", "list"]), project, app)
}

pub fn service_create(
    project: &str,
    app: &str,
    template: &str,
    plan: &str,
    name: &str,
) -> CommandLine {
    in_app(
        odo(["service", "create", template, "--plan", plan, name]),
        project,
        app,
    )
}

pub fn service_delete(project: &str, app: &str, name: &str) -> CommandLine {
    in_app(odo(["service", "delete", name, "-f"]), project, app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_commands() {
        assert_eq!(version().to_string(), "odo version");
        assert_eq!(
            catalog_list_components().to_string(),
            "odo catalog list components"
        );
        assert_eq!(catalog_list_services().to_string(), "odo catalog list services");
        assert_eq!(
            catalog_describe_service("mongodb").to_string(),
            "odo catalog describe service mongodb"
        );
    }

    #[test]
    fn test_project_and_app_commands() {
        assert_eq!(project_create("demo").to_string(), "odo project create demo");
        assert_eq!(project_delete("demo").to_string(), "odo project delete demo -f");
        assert_eq!(app_list("demo").to_string(), "odo app list --project demo");
        assert_eq!(
            app_delete("demo", "web").to_string(),
            "odo app delete web -f --project demo"
        );
        assert_eq!(
            app_describe("demo", "web").to_string(),
            "odo app describe web --project demo"
        );
    }

    #[test]
    fn test_component_commands() {
        assert_eq!(
            component_describe("p", "a", "c").to_string(),
            "odo describe c --app a --project p"
        );
        assert_eq!(
            component_log("p", "a", "c", false).to_string(),
            "odo log c --app a --project p"
        );
        assert_eq!(
            component_log("p", "a", "c", true).to_string(),
            "odo log c -f --app a --project p"
        );
        assert_eq!(
            component_watch("p", "a", "c").to_string(),
            "odo watch c --app a --project p"
        );
        assert_eq!(
            component_push("p", "a", "c").to_string(),
            "odo push c --app a --project p"
        );

        let git = ComponentSource::git("https://github.com/sclorg/nodejs-ex");
        assert_eq!(
            component_create("p", "a", "c", "nodejs", "8", Some(&git)).args,
            vec![
                "create",
                "nodejs:8",
                "c",
                "--git",
                "https://github.com/sclorg/nodejs-ex",
                "--app",
                "a",
                "--project",
                "p"
            ]
        );
    }

    #[test]
    fn test_component_scoped_commands() {
        assert_eq!(
            storage_create("p", "a", "c", "data", "/var/data", 1).to_string(),
            "odo storage create data --path=/var/data --size=1Gi --component c --app a --project p"
        );
        assert_eq!(
            url_create("p", "a", "c", "web", Some(8080)).to_string(),
            "odo url create web --port 8080 --component c --app a --project p"
        );
        assert_eq!(
            url_delete("p", "a", "c", "web").to_string(),
            "odo url delete web -f --component c --app a --project p"
        );
        assert_eq!(
            link("p", "a", "c", "db").to_string(),
            "odo link db --component c --app a --project p"
        );
    }

    #[test]
    fn test_names_are_substituted_verbatim() {
        let command = service_create("p", "a", "mongodb-persistent", "default", "my db");
        assert_eq!(
            command.args,
            vec![
                "service",
                "create",
                "mongodb-persistent",
                "--plan",
                "default",
                "my db",
                "--app",
                "a",
                "--project",
                "p"
            ]
        );
    }
}
