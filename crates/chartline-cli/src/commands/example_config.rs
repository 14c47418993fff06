//! Example command - print a documented charts configuration

/// Annotated configuration printed by `--example-config`
pub const EXAMPLE_CONFIG: &str = r#"# apiVersion selects the layout of this file. Only "v1" exists.
apiVersion: v1

# name becomes release.name inside every chart. "--name" overrides it, and
# one of the two is required.
name: my-bundled-apps

# namespace becomes release.namespace inside every chart. chartline never
# talks to a cluster, so apply the output to this same namespace yourself.
# "--namespace" overrides it, and one of the two is required.
namespace: apps

# charts lists the charts to compile, in the order their manifests appear in
# the output. Each item is a single key: the chart location.
#
# A location is either a path to a local chart directory, REPO/NAME for a
# chart in a configured repository, or a bare NAME looked up in every
# configured repository. "stable" is configured out of the box; other
# repositories are added with "--repo NAME=URL" or the "repo" field below.
charts:
- stable/redis:
    # version is an optional version constraint. The highest version in the
    # repository index that satisfies it is used, for example:
    #   1.2.3             exactly 1.2.3
    #   ^1.2              >=1.2.0, <2.0.0
    #   ~1.2              >=1.2.0, <1.3.0
    #   ~> 1.2            >=1.2.0, <2.0.0
    #   >=1.0, <2.0       both bounds
    #   1.2 - 1.4.5       inclusive range
    #   ^1.0 || ^3.0      either range
    version: ~> 10.0

    # values overrides the chart's own values.yaml, merged key by key.
    values:
      cluster:
        enabled: false
      master:
        # The whole file is a template before it is read as YAML, so
        # environment variables can be pulled in with env() or expandenv().
        persistence:
          size: {{ env("REDIS_DISK_SIZE") | default("8Gi") }}

- acme/api:
    # repo registers the first segment of the location ("acme") as a
    # repository with this URL before charts are resolved.
    repo: https://charts.example.com
    values:
      image:
        tag: "{{ expandenv('${API_TAG}') }}"

# A local chart needs no repository and ignores version constraints.
- ./charts/worker:
    values:
      replicas: 2
"#;

pub fn run() {
    println!("{}", EXAMPLE_CONFIG);
}
