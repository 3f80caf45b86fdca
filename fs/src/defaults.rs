/// Example snippets written by `seed_defaults`: `(folder, name, content)`.
pub const DEFAULT_SNIPPETS: &[(&str, &str, &str)] = &[
    ("Find", "in directory", "find . -maxdepth 1 ${name}"),
    ("Find", "from directory", "find . -iname ${name}"),
    (
        "Find",
        "from directory and exec command",
        "find . -iname ${name} -exec ${exec_command}",
    ),
    (
        "Find",
        "from directory and exec rm",
        "find . -iname ${name} -exec rm {}",
    ),
    ("Find", "files larger than", "find . -size +${size}M"),
    ("Find", "files smaller than", "find . -size -${size}M"),
    ("SSH", "connect", "ssh ${user}@${host}"),
    (
        "SSH",
        "copy from remote to local",
        "scp ${user@hostname#port}:${remote_path}/${file} ${file}",
    ),
    (
        "SSH",
        "copy from local to remote",
        "scp ${file} ${user@hostname#port}:${remote_path}/${file}",
    ),
    (
        "SSH",
        "copy remote to remote",
        "scp ${user@source_hostname#port}:${source_path}/${file} ${user@dest_hostname#port}:${dest_path}/${file}",
    ),
    (
        "Git",
        "config user and email",
        "git config --global user.name \"${first_name_last_name}\"\ngit config --global user.email \"${email}\"",
    ),
];
