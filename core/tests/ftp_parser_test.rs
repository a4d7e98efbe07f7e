#[cfg(test)]
mod tests {
    use dendrographer::handler::ftp::parse_list_line;

    #[test]
    fn test_unix_file() {
        let parsed = parse_list_line("-rw-r--r--   1 root     wheel        168 Jan  1  2020 welcome.msg");
        assert_eq!(parsed, Some(("welcome.msg".to_string(), Some(false))));
    }

    #[test]
    fn test_unix_directory() {
        let parsed = parse_list_line("drwxr-xr-x   2 root     wheel        512 Jan  1  2020 pub");
        assert_eq!(parsed, Some(("pub".to_string(), Some(true))));
    }

    #[test]
    fn test_unix_name_with_spaces() {
        let parsed = parse_list_line("drwxr-xr-x   2 ftp      ftp          512 Mar  3 11:20 My Documents");
        assert_eq!(parsed, Some(("My Documents".to_string(), Some(true))));
    }

    #[test]
    fn test_unix_symlink_strips_target() {
        let parsed = parse_list_line("lrwxrwxrwx   1 root     wheel          7 Jan  1  2020 www -> public");
        assert_eq!(parsed, Some(("www".to_string(), None)));
    }

    #[test]
    fn test_unix_special_files_stay_undetermined() {
        let parsed = parse_list_line("prw-r--r--   1 root     wheel          0 Jan  1  2020 fifo");
        assert_eq!(parsed, Some(("fifo".to_string(), None)));
    }

    #[test]
    fn test_unix_short_line_is_skipped() {
        assert_eq!(parse_list_line("drwxr-xr-x 2 root wheel"), None);
    }

    #[test]
    fn test_msdos_directory() {
        let parsed = parse_list_line("01-16-02  11:14AM       <DIR>          epsgroup");
        assert_eq!(parsed, Some(("epsgroup".to_string(), Some(true))));
    }

    #[test]
    fn test_msdos_file() {
        let parsed = parse_list_line("04-11-02  03:04PM             1234 photo.jpg");
        assert_eq!(parsed, Some(("photo.jpg".to_string(), Some(false))));
    }

    #[test]
    fn test_eplf_directory() {
        let parsed = parse_list_line("+i8388621.48594,m825718503,/,\tarchive");
        assert_eq!(parsed, Some(("archive".to_string(), Some(true))));
    }

    #[test]
    fn test_eplf_file() {
        let parsed = parse_list_line("+i8388621.44468,m839956783,r,s259,\treadme.txt");
        assert_eq!(parsed, Some(("readme.txt".to_string(), Some(false))));
    }

    #[test]
    fn test_unknown_lines_are_skipped() {
        assert_eq!(parse_list_line("total 14"), None);
        assert_eq!(parse_list_line(""), None);
        assert_eq!(parse_list_line("+nofactsnoname"), None);
    }
}
