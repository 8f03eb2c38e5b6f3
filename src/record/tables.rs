//! Lookup tables for VdS 2465 message/error/transport-service codes, carried
//! over in full from the original integration's `VDS_MESSAGES`, `VDS_ERRORS`
//! and `VDS_TRANSPORT_SERVICES` dictionaries so every documented code gets a
//! human-readable `text` field instead of a generic placeholder.

/// Text for a message/status code (the `meldungsart` byte of a `0x02`,
/// `0x03`, `0x04` or `0x20` record). Unknown codes format as `"Unbekannt
/// (N)"`, matching the original's `.get(code, f"Unbekannt ({code})")`.
pub fn message_text(code: u8) -> String {
    let known = match code {
        0 => "Meldung - Ein",
        128 => "Meldung - Aus",
        1 => "Revisionsmeldung - Ausgeloest",
        129 => "Revisionsmeldung - Zurueckgesetzt",
        2 => "Testmeldung - Ein",
        3 => "GPS-Position - Positionsänderung",
        4 => "Stechstelle - übermittelt",
        16 => "Brandmeldung - Ausgeloest",
        144 => "Brandmeldung - Zurueckgesetzt",
        17 => "Brand - manueller Melder - Ausgeloest",
        145 => "Brand - manueller Melder - Zurueckgesetzt",
        18 => "Brand - automatischer Melder - Ausgeloest",
        146 => "Brand - automatischer Melder - Zurueckgesetzt",
        19 => "Brandmeldung aus Loeschanlage - Ausgeloest",
        147 => "Brandmeldung aus Loeschanlage - Zurueckgesetzt",
        20 => "Katastrophenalarm - Aufgetreten",
        148 => "Katastrophenalarm - Zurueckgesetzt",
        21 => "Gefahrstoffalarm - Ausgelöst",
        149 => "Gefahrstoffalarm - Zurueckgesetzt",
        32 => "Überfall-, Einbruchmeldung - Ausgelöst",
        160 => "Überfall-, Einbruchmeldung - Zurückgesetzt",
        33 => "Überfall - Ausgelöst",
        161 => "Überfall - Zurückgesetzt",
        34 => "Einbruch - Ausgeloest",
        162 => "Einbruch - Zurueckgesetzt",
        35 => "Sabotage - Ausgelöst",
        163 => "Sabotage - Zurueckgesetzt",
        36 => "Geiselnahmen - Ausgelöst",
        164 => "Geiselnahmen - Zurueckgesetzt",
        37 => "Amok-Alarm - Ausgelöst",
        165 => "Amok-Alarm - Zurueckgesetzt",
        38 => "Überfall Funkmelder - Ausgelöst",
        166 => "Überfall Funkmelder - Zurueckgesetzt",
        39 => "Bedrohung - Ausgelöst",
        167 => "Bedrohung - Zurueckgesetzt",
        40 => "Belästigung - Ausgelöst",
        168 => "Belästigung - Zurueckgesetzt",
        41 => "Notfall (NGRS-Notfall) - Ausgelöst",
        169 => "Notfall (NGRS-Notfall) - Zurueckgesetzt",
        42 => "Notruf (NGRS-Notruf) - Ausgelöst",
        170 => "Notruf (NGRS-Notruf) - Zurueckgesetzt",
        47 => "Bereichsmeldung Überfall, Einbruch - Ausgelöst",
        175 => "Bereichsmeldung Überfall, Einbruch - Zurueckgesetzt",
        48 => "Störungsmeldungen - Ausgelöst",
        176 => "Störungsmeldungen - Zurückgesetzt",
        49 => "Störung Primärleitung - Ausgelöst",
        177 => "Störung Primärleitung - Zurückgesetzt",
        50 => "Störung Netz - Ausgelöst",
        178 => "Störung Netz - Zurückgesetzt",
        51 => "Störung Batterie - Ausgelöst",
        179 => "Störung Batterie - Zurückgesetzt",
        52 => "Störung Übertragungsweg - Ausgelöst",
        180 => "Störung Übertragungsweg - Zurückgesetzt",
        53 => "Störung Erdschluß - Ausgelöst",
        181 => "Störung Erdschluß - Zurückgesetzt",
        54 => "Störung Testmeldung - Nicht erhalten",
        182 => "Störung Testmeldung - Wieder in Ordnung",
        55 => "Störung Energieversorgung ÜG - Ausgelöst",
        183 => "Störung Energieversorgung ÜG - Wieder in Ordnung",
        56 => "Störung, Pufferüberlauf - Ausgelöst",
        184 => "Störung, Pufferüberlauf - Zurückgesetzt",
        57 => "Nicht abgesetzte Meldungen - Ausgelöst",
        185 => "Nicht abgesetzte Meldungen - Zurückgesetzt",
        58 => "Störung Übertragungsweg 1 - Ausgelöst",
        186 => "Störung Übertragungsweg 1 - Zurückgesetzt",
        59 => "Störung Übertragungsweg 2 - Ausgelöst",
        187 => "Störung Übertragungsweg 2 - Zurückgesetzt",
        60 => "IT-Sicherheitsvorfall - Ausgelöst",
        188 => "IT-Sicherheitsvorfall - Zurückgesetzt",
        61 => "Störung GPS - Ausgelöst",
        189 => "Störung GPS - Zurückgesetzt",
        62 => "Störung Testmeldung Erstweg - Ausgelöst",
        190 => "Störung Testmeldung Erstweg - Zurückgesetzt",
        63 => "Störung Testmeldung Zweitweg - Ausgelöst",
        191 => "Störung Testmeldung Zweitweg - Zurückgesetzt",
        64 => "Technische Meldung - Ausgelöst",
        192 => "Technische Meldung - Zurückgesetzt",
        65 => "Technikalarm - Ausgelöst",
        193 => "Technikalarm - Zurückgesetzt",
        72 => "Notmeldung allgemeine - Ausgelöst",
        200 => "Notmeldung allgemeine - Zurückgesetzt",
        73 => "Notmeldung 1 - Ausgelöst",
        201 => "Notmeldung 1 - Zurückgesetzt",
        74 => "Notmeldung 2 - Ausgelöst",
        202 => "Notmeldung 2 - Zurückgesetzt",
        75 => "Notmeldung 3 - Ausgelöst",
        203 => "Notmeldung 3 - Zurückgesetzt",
        76 => "Notmeldung 4 - Ausgelöst",
        204 => "Notmeldung 4 - Zurückgesetzt",
        77 => "Technische Störung, (GMA fremde Technik) - Ausgelöst",
        205 => "Technische Störung, (GMA fremde Technik) - Zurückgesetzt",
        80 => "Gerätemeldungen - Aktivieren",
        208 => "Gerätemeldungen - Zurücknehmen",
        81 => "Abschaltung - Aktivieren",
        209 => "Abschaltung - Zurücknehmen",
        82 => "Rücksetzen - Aktivieren",
        83 => "Wiederanlauf, Neustart - Aktivieren",
        84 => "Meldungspufferüberlauf - Aufgetreten",
        85 => "Systemstörung - Aufgetreten",
        86 => "Deckelkontakt - Offen",
        214 => "Deckelkontakt - Geschlossen",
        87 => "Batteriewarnung (z. B. Funkmelder) - Aufgetreten",
        215 => "Batteriewarnung (z. B. Funkmelder) - Zurückgesetzt",
        96 => "Zustandsmeldungen - Ein",
        224 => "Zustandsmeldungen - Aus",
        97 => "Sicherungsbereich - Scharf",
        225 => "Sicherungsbereich - Unscharf",
        98 => "Internbereich - Ein",
        226 => "Internbereich - Aus",
        99 => "Revisionszustand - Ein",
        227 => "Revisionszustand - Aus",
        100 => "Tagbetrieb - Ein",
        228 => "Tagbetrieb - Aus",
        101 => "Positionsalarm, unerlaubtes Betreten - Ein",
        229 => "Positionsalarm, unerlaubtes Betreten - Aus",
        102 => "Positionsalarm, unerlaubtes Verlassen - Ein",
        230 => "Positionsalarm, unerlaubtes Verlassen - Aus",
        112 => "Firmenspezifische Meldungen - Ein",
        240 => "Firmenspezifische Meldungen - Aus",
        _ => return format!("Unbekannt ({code})"),
    };
    known.to_string()
}

/// Text for an error code (the second body byte of a `0x11` record).
pub fn error_text(code: u8) -> String {
    let known = match code {
        0 => "Allgemein: Fehler",
        1 => "Nicht bekannt",
        2 => "Nicht erfuellbar",
        3 => "Negativquittierung",
        4 => "Falscher Sicherheitscode",
        0x10 => "Adresse nicht vorhanden/ausserhalb Bereich",
        0x18 => "Funktion an dieser Adresse nicht moeglich",
        0x20 => "Daten ausserhalb des Wertebereichs",
        0x80 => "Pruefsumme fehlerhaft",
        _ => return format!("Unbekannter Fehler {code}"),
    };
    known.to_string()
}

/// Name for a transport-service id (the single body byte of a `0x61`
/// record).
pub fn transport_service_name(id: u8) -> String {
    let known = match id {
        0x10 => "Analoge Festverbindung",
        0x20 => "Analoge Bedarfsgesteuerte Verbindung",
        0x30 => "X.25 bzw. Datex-P",
        0x40 => "ISDN, B-Kanal",
        0x50 => "ISDN, D-Kanal",
        0x60 => "Buendelfunk, Betriebsfunk",
        0x70 => "Datenfunk",
        0x80 => "Mobilfunk",
        0x90 => "TCP/IP-Intranet-Uebertragung",
        _ => return format!("Unbekannt ({id})"),
    };
    known.to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_message_code_resolves() {
        assert_eq!(message_text(34), "Einbruch - Ausgeloest");
        assert_eq!(message_text(54), "Störung Testmeldung - Nicht erhalten");
    }

    #[test]
    fn unknown_message_code_formats_placeholder() {
        assert_eq!(message_text(255), "Unbekannt (255)");
    }

    #[test]
    fn known_error_code_resolves() {
        assert_eq!(error_text(0x80), "Pruefsumme fehlerhaft");
    }
}
